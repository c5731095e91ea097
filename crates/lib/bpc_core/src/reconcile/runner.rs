// @awa-component: REC-Runner
//
//! Per-corporation reconciliation runs.
//!
//! At most one run per corporation is in flight; a second request while one
//! runs is skipped rather than queued. The fetch is bounded by a timeout and
//! nothing is written unless the fetch completes and the diff is non-empty.

use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashSet;
use tracing::{info, warn};

use super::ReconcileError;
use super::diff::Reconciler;
use super::snapshots::SnapshotRepository;
use crate::models::{Blueprint, CorporationId, ReconciliationEvent};

/// Result of a run request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The run finished; `events` were committed (none when unchanged).
    Completed { events: Vec<ReconciliationEvent> },
    /// Another run for the same corporation was already in flight.
    Skipped,
}

impl RunOutcome {
    pub fn events(&self) -> &[ReconciliationEvent] {
        match self {
            RunOutcome::Completed { events } => events,
            RunOutcome::Skipped => &[],
        }
    }
}

/// Marks a corporation busy until dropped.
struct InFlight<'a> {
    running: &'a DashSet<CorporationId>,
    corporation_id: CorporationId,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.running.remove(&self.corporation_id);
    }
}

pub struct ReconcileRunner {
    reconciler: Reconciler,
    repository: Arc<dyn SnapshotRepository>,
    running: DashSet<CorporationId>,
    fetch_timeout: Duration,
}

impl ReconcileRunner {
    pub fn new(
        reconciler: Reconciler,
        repository: Arc<dyn SnapshotRepository>,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            reconciler,
            repository,
            running: DashSet::new(),
            fetch_timeout,
        }
    }

    /// Whether a run for `corporation_id` is in flight.
    pub fn is_running(&self, corporation_id: CorporationId) -> bool {
        self.running.contains(&corporation_id)
    }

    /// Fetch, diff against the stored snapshot and commit.
    ///
    /// Dropping the returned future before the commit leaves stored state
    /// untouched.
    pub async fn run<F, Fut, E>(
        &self,
        corporation_id: CorporationId,
        fetch: F,
    ) -> Result<RunOutcome, ReconcileError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<Blueprint>, E>>,
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        let Some(_claim) = self.claim(corporation_id) else {
            warn!(corporation_id, "reconciliation already running, skipping");
            return Ok(RunOutcome::Skipped);
        };

        let stored = self.repository.load_snapshot(corporation_id).await?;

        let fetched = match tokio::time::timeout(self.fetch_timeout, fetch()).await {
            Ok(result) => result.map_err(|e| ReconcileError::Aborted {
                corporation_id,
                source: e.into(),
            })?,
            Err(_) => {
                return Err(ReconcileError::TimedOut {
                    corporation_id,
                    after: self.fetch_timeout,
                });
            }
        };

        let events = self
            .reconciler
            .diff(corporation_id, &fetched, &stored, Utc::now());
        if !events.is_empty() {
            self.repository
                .commit(corporation_id, &fetched, &events)
                .await?;
        }
        info!(
            corporation_id,
            blueprints = fetched.len(),
            events = events.len(),
            "reconciliation complete"
        );
        Ok(RunOutcome::Completed { events })
    }

    fn claim(&self, corporation_id: CorporationId) -> Option<InFlight<'_>> {
        // The guard must not exist unless this call took the claim.
        if !self.running.insert(corporation_id) {
            return None;
        }
        Some(InFlight {
            running: &self.running,
            corporation_id,
        })
    }
}
