//! EVE SSO and ESI collaborators.
//!
//! Thin typed wrappers over the endpoints the engine needs: the SSO token
//! endpoint (code exchange and refresh), access-token claim decoding, and
//! the corporation endpoints fetched during reconciliation.

pub mod client;
pub mod errors;
pub mod jwt;
pub mod oauth;

use thiserror::Error;

pub use errors::{ApiFailure, ErrorClass, classify};

/// SSO and ESI errors.
#[derive(Debug, Error)]
pub enum EsiError {
    #[error("ESI request failed: {0}")]
    Api(ApiFailure),

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("Invalid SSO access token: {0}")]
    InvalidToken(String),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl EsiError {
    /// Classification used by retry and credential-removal decisions.
    pub fn class(&self) -> ErrorClass {
        match self {
            EsiError::Api(failure) => classify(failure),
            _ => ErrorClass::Unknown,
        }
    }
}

impl From<reqwest::Error> for EsiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            EsiError::Decode(e.to_string())
        } else {
            EsiError::Api(ApiFailure::from(e))
        }
    }
}

/// Turn a non-success response into an [`EsiError::Api`].
pub(crate) async fn error_for_status(
    resp: reqwest::Response,
) -> Result<reqwest::Response, EsiError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    Err(EsiError::Api(ApiFailure::Http { status, body }))
}
