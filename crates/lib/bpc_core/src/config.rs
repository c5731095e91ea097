// @awa-component: CFG-CoreConfig
//
//! Engine configuration read from the environment.

use std::time::Duration;

use thiserror::Error;

use crate::models::CharacterId;
use crate::session::SessionIdentity;
use crate::skew::{ClockSkewPolicy, DEFAULT_SKEW};

/// Default request timeout for SSO and ESI calls.
pub const DEFAULT_ESI_TIMEOUT: Duration = Duration::from_secs(30);

/// Default session lifetime: 7 days.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

/// SSO application credentials.
#[derive(Clone, Debug)]
pub struct SsoConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

/// Configuration consumed by the engine.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    pub sso: SsoConfig,
    /// Tolerance subtracted from token expiry before use.
    pub jwt_skew: Duration,
    pub database_url: String,
    /// Bound on every SSO/ESI request.
    pub esi_timeout: Duration,
    pub session_ttl: Duration,
    /// Character whose token serves admin operations when set.
    pub admin_character: Option<CharacterId>,
}

impl CoreConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable           | Default                          |
    /// |--------------------|----------------------------------|
    /// | `ESI_APP_ID`       | required                         |
    /// | `ESI_APP_SECRET`   | required                         |
    /// | `ESI_APP_REDIRECT` | `http://localhost:2727/callback` |
    /// | `JWT_SKEW`         | `5m`                             |
    /// | `DATABASE_URL`     | `postgres://localhost:5432/bpc`  |
    /// | `ESI_TIMEOUT`      | `30s`                            |
    /// | `SESSION_TTL`      | `7days`                          |
    /// | `ADMIN_CHARACTER`  | unset                            |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`CoreConfig::from_env`] over an arbitrary lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let sso = SsoConfig {
            client_id: get("ESI_APP_ID").ok_or(ConfigError::Missing("ESI_APP_ID"))?,
            client_secret: get("ESI_APP_SECRET").ok_or(ConfigError::Missing("ESI_APP_SECRET"))?,
            redirect_uri: get("ESI_APP_REDIRECT")
                .unwrap_or_else(|| "http://localhost:2727/callback".into()),
        };

        let jwt_skew = match get("JWT_SKEW") {
            Some(v) => parse_duration("JWT_SKEW", &v)?,
            None => DEFAULT_SKEW,
        };
        let esi_timeout = match get("ESI_TIMEOUT") {
            Some(v) => parse_duration("ESI_TIMEOUT", &v)?,
            None => DEFAULT_ESI_TIMEOUT,
        };
        let session_ttl = match get("SESSION_TTL") {
            Some(v) => parse_duration("SESSION_TTL", &v)?,
            None => DEFAULT_SESSION_TTL,
        };
        let admin_character = get("ADMIN_CHARACTER")
            .map(|v| {
                v.trim().parse::<CharacterId>().map_err(|e| ConfigError::Invalid {
                    key: "ADMIN_CHARACTER",
                    message: e.to_string(),
                })
            })
            .transpose()?;

        Ok(Self {
            sso,
            jwt_skew,
            database_url: get("DATABASE_URL")
                .unwrap_or_else(|| "postgres://localhost:5432/bpc".into()),
            esi_timeout,
            session_ttl,
            admin_character,
        })
    }

    pub fn skew_policy(&self) -> ClockSkewPolicy {
        ClockSkewPolicy::new(self.jwt_skew)
    }

    /// Session table whose keys live for `session_ttl`.
    pub fn session_identity(&self) -> SessionIdentity {
        SessionIdentity::new(self.session_ttl)
    }
}

/// Parse a human duration such as `5m`, `90s` or `1h 30m`.
pub fn parse_duration(key: &'static str, value: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(value.trim()).map_err(|e| ConfigError::Invalid {
        key,
        message: e.to_string(),
    })
}
