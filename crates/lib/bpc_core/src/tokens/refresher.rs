// @awa-component: TOK-TokenRefresher
//
//! Token refresh.
//!
//! A refresher only talks to the token endpoint and hands back the updated
//! token. It never writes to the store, so the caller decides whether to
//! persist the result or drop the character.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, warn};

use crate::esi::ErrorClass;
use crate::esi::oauth::SsoClient;
use crate::models::{CharacterId, CharacterToken};

/// Refresh failures, already classified.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RefreshError {
    /// The refresh token was revoked or expired. Not retryable; the token
    /// must be removed.
    #[error("Refresh token for character {character_id} is no longer valid")]
    InvalidGrant { character_id: CharacterId },

    /// Network, 5xx, rate limit, timeout or an unrecognised failure. The
    /// token is left untouched and the caller may retry later.
    #[error("Transient refresh failure for character {character_id}: {message}")]
    Transient {
        character_id: CharacterId,
        message: String,
    },
}

/// Exchanges a stale token for a fresh one.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(
        &self,
        token: &CharacterToken,
        now: DateTime<Utc>,
    ) -> Result<CharacterToken, RefreshError>;
}

/// Refresher backed by the EVE SSO token endpoint.
#[derive(Debug, Clone)]
pub struct SsoTokenRefresher {
    sso: SsoClient,
}

impl SsoTokenRefresher {
    pub fn new(sso: SsoClient) -> Self {
        Self { sso }
    }
}

#[async_trait]
impl TokenRefresher for SsoTokenRefresher {
    async fn refresh(
        &self,
        token: &CharacterToken,
        now: DateTime<Utc>,
    ) -> Result<CharacterToken, RefreshError> {
        let character_id = token.character_id;
        match self.sso.refresh(&token.refresh_token).await {
            Ok(resp) => {
                let expires_at = resp.expires_at(now);
                debug!(character_id, %expires_at, rotated = resp.refresh_token.is_some(), "token refreshed");
                Ok(token.refreshed(resp.access_token, expires_at, resp.refresh_token))
            }
            Err(e) => match e.class() {
                ErrorClass::InvalidGrant => {
                    warn!(character_id, error = %e, "refresh token rejected");
                    Err(RefreshError::InvalidGrant { character_id })
                }
                ErrorClass::RateLimited | ErrorClass::Transient | ErrorClass::Unknown => {
                    Err(RefreshError::Transient {
                        character_id,
                        message: e.to_string(),
                    })
                }
            },
        }
    }
}
