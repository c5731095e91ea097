//! Character token pool and refresh.
//!
//! [`store::TokenStore`] holds one token per character in memory and writes
//! through to a [`repository::TokenRepository`]. [`refresher::TokenRefresher`]
//! turns a stale token into a fresh one without touching the store; the
//! scope resolver decides what to do with the result.

pub mod refresher;
pub mod repository;
pub mod store;

use thiserror::Error;

use crate::models::CharacterId;

pub use refresher::{RefreshError, SsoTokenRefresher, TokenRefresher};
pub use repository::{InMemoryTokenRepository, PgTokenRepository, TokenRepository};
pub use store::TokenStore;

/// Token errors.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Character {character_id} was granted no scopes")]
    NoScopes { character_id: CharacterId },

    #[error("Stored token for character {character_id} is corrupt: {message}")]
    Corrupt {
        character_id: CharacterId,
        message: String,
    },

    #[error("Database error: {0}")]
    DbError(#[from] sqlx::Error),
}
