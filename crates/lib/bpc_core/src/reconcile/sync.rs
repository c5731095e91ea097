// @awa-component: REC-BlueprintSync
//
//! Blueprint sync for one corporation: resolve a token carrying the
//! blueprint scope, fetch from ESI, reconcile.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use super::ReconcileError;
use super::runner::{ReconcileRunner, RunOutcome};
use crate::esi::client::EsiClient;
use crate::models::{CharacterId, CorporationId, Scope, ScopeSourcePair};
use crate::scopes::{Operation, READ_CORPORATION_BLUEPRINTS, ResolutionError, ScopeResolver};

/// Entry point for scheduled blueprint syncs.
pub struct BlueprintSync {
    resolver: Arc<ScopeResolver>,
    esi: EsiClient,
    runner: ReconcileRunner,
    admin_character: Option<CharacterId>,
}

impl BlueprintSync {
    pub fn new(resolver: Arc<ScopeResolver>, esi: EsiClient, runner: ReconcileRunner) -> Self {
        Self {
            resolver,
            esi,
            runner,
            admin_character: None,
        }
    }

    /// Fall back to this character's token when no member of the
    /// corporation grants the blueprint scope.
    pub fn with_admin_character(mut self, character_id: Option<CharacterId>) -> Self {
        self.admin_character = character_id;
        self
    }

    pub async fn sync(&self, corporation_id: CorporationId) -> Result<RunOutcome, ReconcileError> {
        if self.runner.is_running(corporation_id) {
            debug!(corporation_id, "sync already running");
            return Ok(RunOutcome::Skipped);
        }

        let source = self.blueprint_source(corporation_id).await?;
        info!(
            corporation_id,
            character_id = source.character_id,
            "syncing corporation blueprints"
        );

        let esi = &self.esi;
        let token = source.access_token.as_str();
        self.runner
            .run(corporation_id, || esi.corporation_blueprints(corporation_id, token))
            .await
    }

    async fn blueprint_source(
        &self,
        corporation_id: CorporationId,
    ) -> Result<ScopeSourcePair, ReconcileError> {
        let required = Operation::CorporationBlueprints.required_scopes();

        let pairs = match self
            .resolver
            .resolve_for_corporation(corporation_id, &required, Utc::now())
            .await
        {
            Ok(pairs) => pairs,
            Err(ResolutionError::NoCoverage { scope }) => match self.admin_character {
                Some(admin) => {
                    debug!(corporation_id, %scope, admin, "falling back to admin character");
                    self.resolver
                        .resolve_for_character(admin, &required, Utc::now())
                        .await?
                }
                None => return Err(ResolutionError::NoCoverage { scope }.into()),
            },
            Err(e) => return Err(e.into()),
        };

        pairs.into_iter().next().ok_or_else(|| {
            ResolutionError::NoCoverage {
                scope: Scope::from(READ_CORPORATION_BLUEPRINTS),
            }
            .into()
        })
    }
}
