// Import and re-export the `error` module
pub use self::error::{Error, Result};
mod error;

use clap::Parser;
use cli::Cli;

mod cli;
mod commands;
mod logging;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let _logger = logging::init()?;

    let args = Cli::parse();

    if let Err(e) = commands::execute(args).await {
        log::error!("{}", e);
        std::process::exit(e.exit_code());
    }
    Ok(())
}
