// @awa-component: ESI-ErrorClassifier
//
//! Classification of SSO and ESI failures.
//!
//! ESI and the SSO token endpoint report errors as JSON bodies carrying an
//! `error` string, next to an HTTP status. Only those two signals are
//! inspected; any other shape is [`ErrorClass::Unknown`].

use std::fmt;

use serde::Deserialize;

/// ESI's "error limited" status.
pub const STATUS_ERROR_LIMITED: u16 = 420;

/// Status used by the SSO endpoint and the ESI gateway for throttling.
pub const STATUS_TOO_MANY_REQUESTS: u16 = 429;

/// A failed call to SSO or ESI, as seen on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiFailure {
    /// The server answered with a non-success status.
    Http { status: u16, body: String },
    /// The caller-supplied deadline passed.
    Timeout,
    /// The request never produced a response.
    Connection(String),
}

impl fmt::Display for ApiFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiFailure::Http { status, body } => match parse_error_message(body) {
                Some(msg) => write!(f, "HTTP {status}: {msg}"),
                None => write!(f, "HTTP {status}"),
            },
            ApiFailure::Timeout => f.write_str("request timed out"),
            ApiFailure::Connection(msg) => write!(f, "connection failed: {msg}"),
        }
    }
}

impl From<reqwest::Error> for ApiFailure {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ApiFailure::Timeout
        } else if let Some(status) = e.status() {
            ApiFailure::Http {
                status: status.as_u16(),
                body: String::new(),
            }
        } else {
            ApiFailure::Connection(e.to_string())
        }
    }
}

/// How callers should react to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The credential is permanently unusable. Remove it, never retry.
    InvalidGrant,
    /// The caller is throttled. Retry later.
    RateLimited,
    /// Network trouble, 5xx or timeout. Retry with backoff.
    Transient,
    /// Unrecognised shape. Treated as transient by callers.
    Unknown,
}

impl ErrorClass {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ErrorClass::InvalidGrant)
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// Extract the `error` string from a JSON error body, if any.
pub fn parse_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .filter(|e| !e.is_empty())
}

/// Classify a failure.
pub fn classify(failure: &ApiFailure) -> ErrorClass {
    match failure {
        ApiFailure::Timeout | ApiFailure::Connection(_) => ErrorClass::Transient,
        ApiFailure::Http { status, body } => {
            if matches!(
                parse_error_message(body).as_deref(),
                Some("invalid_grant" | "invalid_token")
            ) {
                return ErrorClass::InvalidGrant;
            }
            match *status {
                STATUS_ERROR_LIMITED | STATUS_TOO_MANY_REQUESTS => ErrorClass::RateLimited,
                500..=599 => ErrorClass::Transient,
                _ => ErrorClass::Unknown,
            }
        }
    }
}
