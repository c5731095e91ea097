// @awa-component: TOK-Repository
//
//! Durable token storage.
//!
//! Tokens are upserted by character ID into `character_tokens`:
//!
//! | column           | type          |
//! |------------------|---------------|
//! | `character_id`   | `BIGINT` PK   |
//! | `character_name` | `TEXT`        |
//! | `corporation_id` | `BIGINT NULL` |
//! | `access_token`   | `TEXT`        |
//! | `refresh_token`  | `TEXT`        |
//! | `expires_at`     | `TIMESTAMPTZ` |
//! | `scopes`         | `TEXT[]`      |

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tokio::sync::Mutex;

use super::TokenError;
use crate::models::{CharacterId, CharacterToken, Scope};

/// Durable side of the token store.
#[async_trait]
pub trait TokenRepository: Send + Sync {
    /// Insert or replace the token for `token.character_id`.
    async fn save(&self, token: &CharacterToken) -> Result<(), TokenError>;

    /// Delete the token for `character_id`. Deleting a missing token is not an error.
    async fn delete(&self, character_id: CharacterId) -> Result<(), TokenError>;

    /// Every stored token.
    async fn load_all(&self) -> Result<Vec<CharacterToken>, TokenError>;
}

/// Postgres-backed repository.
#[derive(Clone)]
pub struct PgTokenRepository {
    pool: PgPool,
}

impl PgTokenRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

type TokenRow = (
    i64,
    String,
    Option<i64>,
    String,
    String,
    DateTime<Utc>,
    Vec<String>,
);

#[async_trait]
impl TokenRepository for PgTokenRepository {
    async fn save(&self, token: &CharacterToken) -> Result<(), TokenError> {
        let scopes: Vec<String> = token
            .granted_scopes()
            .iter()
            .map(|s| s.as_str().to_string())
            .collect();
        sqlx::query(
            "INSERT INTO character_tokens \
                (character_id, character_name, corporation_id, access_token, refresh_token, expires_at, scopes) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (character_id) DO UPDATE SET \
                character_name = EXCLUDED.character_name, \
                corporation_id = EXCLUDED.corporation_id, \
                access_token = EXCLUDED.access_token, \
                refresh_token = EXCLUDED.refresh_token, \
                expires_at = EXCLUDED.expires_at, \
                scopes = EXCLUDED.scopes",
        )
        .bind(token.character_id)
        .bind(&token.character_name)
        .bind(token.corporation_id)
        .bind(&token.access_token)
        .bind(&token.refresh_token)
        .bind(token.expires_at)
        .bind(&scopes)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, character_id: CharacterId) -> Result<(), TokenError> {
        sqlx::query("DELETE FROM character_tokens WHERE character_id = $1")
            .bind(character_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<CharacterToken>, TokenError> {
        let rows = sqlx::query_as::<_, TokenRow>(
            "SELECT character_id, character_name, corporation_id, access_token, refresh_token, expires_at, scopes \
             FROM character_tokens \
             ORDER BY character_id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(
                |(character_id, name, corporation_id, access, refresh, expires_at, scopes)| {
                    let token = CharacterToken::new(
                        character_id,
                        name,
                        access,
                        refresh,
                        expires_at,
                        scopes.into_iter().map(Scope::from),
                    )
                    .map_err(|e| TokenError::Corrupt {
                        character_id,
                        message: e.to_string(),
                    })?;
                    Ok(match corporation_id {
                        Some(corp) => token.with_corporation(corp),
                        None => token,
                    })
                },
            )
            .collect()
    }
}

/// Repository that keeps tokens in process memory only.
#[derive(Default)]
pub struct InMemoryTokenRepository {
    tokens: Mutex<BTreeMap<CharacterId, CharacterToken>>,
}

impl InMemoryTokenRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenRepository for InMemoryTokenRepository {
    async fn save(&self, token: &CharacterToken) -> Result<(), TokenError> {
        self.tokens
            .lock()
            .await
            .insert(token.character_id, token.clone());
        Ok(())
    }

    async fn delete(&self, character_id: CharacterId) -> Result<(), TokenError> {
        self.tokens.lock().await.remove(&character_id);
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<CharacterToken>, TokenError> {
        Ok(self.tokens.lock().await.values().cloned().collect())
    }
}
