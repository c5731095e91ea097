use thiserror::Error;

use bpc_core::config::ConfigError;
use bpc_core::esi::{ErrorClass, EsiError};
use bpc_core::reconcile::ReconcileError;
use bpc_core::scopes::ResolutionError;
use bpc_core::tokens::TokenError;

pub type Result<T> = core::result::Result<T, Error>;

/// `EX_TEMPFAIL`: the scheduler should try again later.
pub const EXIT_RETRY: i32 = 75;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{}", .0)]
    Custom(String),

    #[error("IO::{:?}: {}", .0, .0)]
    Io(#[from] std::io::Error),

    #[error("FlexiLogger::{:?}: {}", .0, .0)]
    FlexiLogger(#[from] flexi_logger::FlexiLoggerError),

    #[error("Config: {}", .0)]
    Config(#[from] ConfigError),

    #[error("Database: {}", .0)]
    Database(#[from] sqlx::Error),

    #[error("ESI: {}", .0)]
    Esi(#[from] EsiError),

    #[error("Tokens: {}", .0)]
    Token(#[from] TokenError),

    #[error("Scopes: {}", .0)]
    Resolution(#[from] ResolutionError),

    #[error("Reconcile: {}", .0)]
    Reconcile(#[from] ReconcileError),
}

impl Error {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        let retryable = match self {
            Error::Reconcile(e) => e.is_retryable(),
            Error::Resolution(e) => e.class().is_some_and(|c| c.is_retryable()),
            Error::Esi(e) => matches!(e.class(), ErrorClass::Transient | ErrorClass::RateLimited),
            _ => false,
        };
        if retryable { EXIT_RETRY } else { 1 }
    }
}
