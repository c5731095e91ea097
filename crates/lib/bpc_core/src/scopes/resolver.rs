// @awa-component: SCP-ScopeResolver
//
//! Scope resolution: pick characters whose tokens cover a scope set.
//!
//! Selection is a greedy set cover. Each round takes the candidate granting
//! the most still-uncovered scopes (lowest character ID on ties), makes sure
//! its token is usable, and assigns it every uncovered scope it grants.
//!
//! A candidate past the skew window gets one refresh attempt. Refreshes run
//! under the character's lock and re-check the store once the lock is held,
//! so concurrent resolutions needing the same stale token share one call to
//! the token endpoint.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::{Operation, ResolutionError};
use crate::models::{CharacterId, CharacterToken, CorporationId, Scope, ScopeSourcePair};
use crate::skew::ClockSkewPolicy;
use crate::tokens::{RefreshError, TokenRefresher, TokenStore};

/// Resolves scope sets to scope source pairs.
pub struct ScopeResolver {
    store: Arc<TokenStore>,
    refresher: Arc<dyn TokenRefresher>,
    policy: ClockSkewPolicy,
}

impl ScopeResolver {
    pub fn new(
        store: Arc<TokenStore>,
        refresher: Arc<dyn TokenRefresher>,
        policy: ClockSkewPolicy,
    ) -> Self {
        Self {
            store,
            refresher,
            policy,
        }
    }

    pub fn store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    /// Cover `required` with any linked character.
    ///
    /// The result holds each required scope exactly once, ordered by scope.
    pub async fn resolve(
        &self,
        required: &BTreeSet<Scope>,
    ) -> Result<Vec<ScopeSourcePair>, ResolutionError> {
        self.resolve_at(required, Utc::now()).await
    }

    /// [`ScopeResolver::resolve`] against an explicit clock.
    pub async fn resolve_at(
        &self,
        required: &BTreeSet<Scope>,
        now: DateTime<Utc>,
    ) -> Result<Vec<ScopeSourcePair>, ResolutionError> {
        self.resolve_among(required, now, |_| true).await
    }

    /// Cover `required` using only characters linked to `corporation_id`.
    pub async fn resolve_for_corporation(
        &self,
        corporation_id: CorporationId,
        required: &BTreeSet<Scope>,
        now: DateTime<Utc>,
    ) -> Result<Vec<ScopeSourcePair>, ResolutionError> {
        self.resolve_among(required, now, |t| t.corporation_id == Some(corporation_id))
            .await
    }

    /// Cover `required` with one specific character's token.
    pub async fn resolve_for_character(
        &self,
        character_id: CharacterId,
        required: &BTreeSet<Scope>,
        now: DateTime<Utc>,
    ) -> Result<Vec<ScopeSourcePair>, ResolutionError> {
        self.resolve_among(required, now, |t| t.character_id == character_id)
            .await
    }

    /// Cover the static scope requirement of `operation` for a corporation.
    pub async fn resolve_operation(
        &self,
        operation: Operation,
        corporation_id: CorporationId,
    ) -> Result<Vec<ScopeSourcePair>, ResolutionError> {
        self.resolve_for_corporation(corporation_id, &operation.required_scopes(), Utc::now())
            .await
    }

    async fn resolve_among(
        &self,
        required: &BTreeSet<Scope>,
        now: DateTime<Utc>,
        admit: impl Fn(&CharacterToken) -> bool,
    ) -> Result<Vec<ScopeSourcePair>, ResolutionError> {
        let mut uncovered = required.clone();
        let mut considered: HashSet<CharacterId> = HashSet::new();
        let mut pairs = Vec::with_capacity(required.len());

        while !uncovered.is_empty() {
            let candidates: Vec<CharacterToken> = self
                .store
                .tokens_covering_any(&uncovered)
                .into_iter()
                .filter(|t| admit(t) && !considered.contains(&t.character_id))
                .collect();

            if let Some(scope) = uncovered
                .iter()
                .find(|s| !candidates.iter().any(|t| t.grants(s)))
            {
                debug!(%scope, "no remaining candidate grants scope");
                return Err(ResolutionError::NoCoverage {
                    scope: scope.clone(),
                });
            }

            let Some(best) = pick_best(candidates, &uncovered) else {
                break;
            };
            considered.insert(best.character_id);

            let Some(token) = self.ensure_fresh(best, now).await? else {
                continue;
            };

            let granted: Vec<Scope> = uncovered
                .iter()
                .filter(|s| token.grants(s))
                .cloned()
                .collect();
            debug!(
                character_id = token.character_id,
                scopes = granted.len(),
                "accepted scope source"
            );
            for scope in granted {
                uncovered.remove(&scope);
                pairs.push(ScopeSourcePair {
                    scope,
                    character_id: token.character_id,
                    access_token: token.access_token.clone(),
                });
            }
        }

        pairs.sort_by(|a, b| a.scope.cmp(&b.scope));
        Ok(pairs)
    }

    /// Return a usable token for `candidate`, refreshing it if it is past the
    /// skew window. `None` means the character's grant is gone.
    async fn ensure_fresh(
        &self,
        candidate: CharacterToken,
        now: DateTime<Utc>,
    ) -> Result<Option<CharacterToken>, ResolutionError> {
        if !self.policy.is_expired(candidate.expires_at, now) {
            return Ok(Some(candidate));
        }

        let character_id = candidate.character_id;
        let _guard = self.store.lock_character(character_id).await;

        // Another resolver may have refreshed or dropped it while we waited.
        let Some(current) = self.store.get(character_id) else {
            debug!(character_id, "token removed while waiting for refresh");
            return Ok(None);
        };
        if !self.policy.is_expired(current.expires_at, now) {
            debug!(character_id, "token refreshed by a concurrent resolution");
            return Ok(Some(current));
        }

        match self.refresher.refresh(&current, now).await {
            Ok(fresh) => {
                // Cached even when persisting fails; the next write persists it.
                if let Err(e) = self.store.write_through(fresh.clone()).await {
                    warn!(character_id, error = %e, "using refreshed token that was not persisted");
                }
                info!(character_id, expires_at = %fresh.expires_at, "refreshed character token");
                Ok(Some(fresh))
            }
            Err(RefreshError::InvalidGrant { .. }) => {
                warn!(character_id, "refresh rejected, unlinking character");
                self.store.evict(character_id).await?;
                Ok(None)
            }
            Err(RefreshError::Transient {
                character_id,
                message,
            }) => Err(ResolutionError::Transient {
                character_id,
                message,
            }),
        }
    }
}

/// Candidate covering the most of `uncovered`; lowest character ID on ties.
fn pick_best(candidates: Vec<CharacterToken>, uncovered: &BTreeSet<Scope>) -> Option<CharacterToken> {
    candidates
        .into_iter()
        .map(|t| (t.coverage(uncovered), t))
        .filter(|(coverage, _)| *coverage > 0)
        .reduce(|best, next| {
            let better = next.0 > best.0
                || (next.0 == best.0 && next.1.character_id < best.1.character_id);
            if better { next } else { best }
        })
        .map(|(_, t)| t)
}
