// @awa-component: TOK-TokenStore
//
//! Live pool of character tokens.
//!
//! Tokens sit in a sharded map keyed by character, so readers and writers
//! for unrelated characters never contend on one lock. Every character also
//! has an async lock that serializes its writes and its refreshes.

use std::collections::BTreeSet;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use super::TokenError;
use super::repository::{InMemoryTokenRepository, TokenRepository};
use crate::models::{CharacterId, CharacterToken, Scope};

/// One token per character, in memory and in the repository.
pub struct TokenStore {
    tokens: DashMap<CharacterId, CharacterToken>,
    character_locks: DashMap<CharacterId, Arc<Mutex<()>>>,
    repository: Arc<dyn TokenRepository>,
}

impl TokenStore {
    pub fn new(repository: Arc<dyn TokenRepository>) -> Self {
        Self {
            tokens: DashMap::new(),
            character_locks: DashMap::new(),
            repository,
        }
    }

    /// Store without durable backing.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryTokenRepository::new()))
    }

    /// Hydrate the pool from the repository. Returns the number of tokens loaded.
    pub async fn load(&self) -> Result<usize, TokenError> {
        let tokens = self.repository.load_all().await?;
        let count = tokens.len();
        for token in tokens {
            self.tokens.insert(token.character_id, token);
        }
        info!(count, "loaded character tokens");
        Ok(count)
    }

    /// Upsert by character. The newest authorization for a character
    /// replaces whatever was stored for it.
    pub async fn put(&self, token: CharacterToken) -> Result<(), TokenError> {
        let _guard = self.lock_character(token.character_id).await;
        self.write_through(token).await
    }

    /// Delete on de-authorization. Returns the removed token, if any.
    pub async fn remove(
        &self,
        character_id: CharacterId,
    ) -> Result<Option<CharacterToken>, TokenError> {
        let _guard = self.lock_character(character_id).await;
        self.evict(character_id).await
    }

    pub fn get(&self, character_id: CharacterId) -> Option<CharacterToken> {
        self.tokens.get(&character_id).map(|t| t.value().clone())
    }

    /// Every token granting at least one of `scopes`, ordered by character ID.
    pub fn tokens_covering_any(&self, scopes: &BTreeSet<Scope>) -> Vec<CharacterToken> {
        let mut covering: Vec<CharacterToken> = self
            .tokens
            .iter()
            .filter(|entry| entry.value().grants_any(scopes))
            .map(|entry| entry.value().clone())
            .collect();
        covering.sort_by_key(|t| t.character_id);
        covering
    }

    /// Linked characters, ordered by character ID.
    pub fn characters(&self) -> Vec<CharacterId> {
        let mut ids: Vec<CharacterId> = self.tokens.iter().map(|e| *e.key()).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Acquire the per-character lock guarding writes and refreshes.
    pub(crate) async fn lock_character(&self, character_id: CharacterId) -> OwnedMutexGuard<()> {
        let lock = self
            .character_locks
            .entry(character_id)
            .or_default()
            .value()
            .clone();
        lock.lock_owned().await
    }

    /// Persist and cache. Caller holds the character lock.
    ///
    /// The pool takes the token even when persisting fails: a refresh may
    /// already have rotated the refresh token at the SSO, and the old one is
    /// dead. The persist error is still returned.
    pub(crate) async fn write_through(&self, token: CharacterToken) -> Result<(), TokenError> {
        let character_id = token.character_id;
        let saved = self.repository.save(&token).await;
        self.tokens.insert(character_id, token);
        match saved {
            Ok(()) => {
                debug!(character_id, "stored character token");
                Ok(())
            }
            Err(e) => {
                warn!(character_id, error = %e, "token not persisted, kept in memory");
                Err(e)
            }
        }
    }

    /// Delete durably then drop from the pool. Caller holds the character lock.
    pub(crate) async fn evict(
        &self,
        character_id: CharacterId,
    ) -> Result<Option<CharacterToken>, TokenError> {
        self.repository.delete(character_id).await?;
        let removed = self.tokens.remove(&character_id).map(|(_, t)| t);
        if removed.is_some() {
            info!(character_id, "removed character token");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, Utc};

    fn token(character_id: CharacterId, scopes: &[&str]) -> CharacterToken {
        CharacterToken::new(
            character_id,
            format!("Pilot {character_id}"),
            format!("access-{character_id}"),
            format!("refresh-{character_id}"),
            Utc::now() + TimeDelta::minutes(20),
            scopes.iter().map(|s| Scope::from(*s)),
        )
        .unwrap()
    }

    fn scopes(names: &[&str]) -> BTreeSet<Scope> {
        names.iter().map(|s| Scope::from(*s)).collect()
    }

    /// Repository whose writes always fail.
    struct UnavailableRepository;

    #[async_trait::async_trait]
    impl TokenRepository for UnavailableRepository {
        async fn save(&self, _token: &CharacterToken) -> Result<(), TokenError> {
            Err(TokenError::DbError(sqlx::Error::PoolTimedOut))
        }

        async fn delete(&self, _character_id: CharacterId) -> Result<(), TokenError> {
            Err(TokenError::DbError(sqlx::Error::PoolTimedOut))
        }

        async fn load_all(&self) -> Result<Vec<CharacterToken>, TokenError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn put_supersedes_previous_authorization() {
        let store = TokenStore::in_memory();
        store.put(token(1, &["a", "b"])).await.unwrap();
        store.put(token(1, &["c"])).await.unwrap();

        assert_eq!(store.len(), 1);
        let stored = store.get(1).unwrap();
        assert_eq!(stored.granted_scopes(), &scopes(&["c"]));
        assert!(store.tokens_covering_any(&scopes(&["a"])).is_empty());
    }

    #[tokio::test]
    async fn covering_any_is_ordered_by_character() {
        let store = TokenStore::in_memory();
        store.put(token(30, &["a"])).await.unwrap();
        store.put(token(10, &["b"])).await.unwrap();
        store.put(token(20, &["a", "b"])).await.unwrap();
        store.put(token(40, &["z"])).await.unwrap();

        let ids: Vec<_> = store
            .tokens_covering_any(&scopes(&["a", "b"]))
            .iter()
            .map(|t| t.character_id)
            .collect();
        assert_eq!(ids, vec![10, 20, 30]);
    }

    #[tokio::test]
    async fn absent_lookups_are_empty_not_errors() {
        let store = TokenStore::in_memory();
        assert!(store.get(1).is_none());
        assert!(store.tokens_covering_any(&scopes(&["a"])).is_empty());
        assert!(store.remove(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn remove_deletes_durably() {
        let repo = Arc::new(InMemoryTokenRepository::new());
        let store = TokenStore::new(repo.clone());
        store.put(token(1, &["a"])).await.unwrap();
        assert_eq!(repo.load_all().await.unwrap().len(), 1);

        let removed = store.remove(1).await.unwrap();
        assert_eq!(removed.map(|t| t.character_id), Some(1));
        assert!(repo.load_all().await.unwrap().is_empty());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn failed_persist_still_updates_pool() {
        let store = TokenStore::new(Arc::new(UnavailableRepository));
        let err = store.put(token(1, &["a"])).await.unwrap_err();
        assert!(matches!(err, TokenError::DbError(_)));

        let cached = store.get(1).unwrap();
        assert_eq!(cached.refresh_token, "refresh-1");
        assert_eq!(store.characters(), vec![1]);
    }

    #[tokio::test]
    async fn load_hydrates_from_repository() {
        let repo = Arc::new(InMemoryTokenRepository::new());
        repo.save(&token(7, &["a"])).await.unwrap();
        repo.save(&token(3, &["b"])).await.unwrap();

        let store = TokenStore::new(repo);
        assert_eq!(store.load().await.unwrap(), 2);
        assert_eq!(store.characters(), vec![3, 7]);
    }
}
