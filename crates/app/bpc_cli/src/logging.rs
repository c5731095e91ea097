use std::io::Write;

use flexi_logger::{DeferredNow, Logger, LoggerHandle, style};
use log::Record;

use crate::Error;

/// `2026-10-17 12:00:00 INFO  [bpc_core::reconcile::runner] message`
fn cli_format(w: &mut dyn Write, now: &mut DeferredNow, record: &Record) -> std::io::Result<()> {
    let level = record.level();
    write!(
        w,
        "{} {} [{}] {}",
        now.format("%Y-%m-%d %H:%M:%S"),
        style(level).paint(format!("{level:<5}")),
        record.target(),
        record.args()
    )
}

/// Log to stderr; stdout carries command output. Keep the handle alive
/// until exit.
pub fn init() -> Result<LoggerHandle, Error> {
    let handle = Logger::try_with_env_or_str("info")?
        .format(cli_format)
        .log_to_stderr()
        .start()?;

    Ok(handle)
}
