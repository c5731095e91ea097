// @awa-component: REC-Reconciler
//
//! Blueprint reconciliation.
//!
//! A fetched blueprint snapshot is diffed against the stored one and only
//! material changes become [`ReconciliationEvent`]s. A failed fetch yields no
//! events at all, and the runner persists snapshot and events together.
//!
//! [`ReconciliationEvent`]: crate::models::ReconciliationEvent

pub mod diff;
pub mod runner;
pub mod snapshots;
pub mod sync;

use std::error::Error as StdError;
use std::time::Duration;

use thiserror::Error;

use crate::esi::{ErrorClass, EsiError};
use crate::models::CorporationId;
use crate::scopes::ResolutionError;

pub use diff::{Reconciler, diff};
pub use runner::{ReconcileRunner, RunOutcome};
pub use snapshots::{InMemorySnapshotRepository, PgSnapshotRepository, SnapshotRepository};
pub use sync::BlueprintSync;

/// Reconciliation errors.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The fetch failed; nothing was diffed or written.
    #[error("Fetch for corporation {corporation_id} failed: {source}")]
    Aborted {
        corporation_id: CorporationId,
        source: Box<dyn StdError + Send + Sync>,
    },

    /// The fetch did not finish in time; nothing was written.
    #[error("Fetch for corporation {corporation_id} timed out after {after:?}")]
    TimedOut {
        corporation_id: CorporationId,
        after: Duration,
    },

    #[error("Scope resolution failed: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("Snapshot for corporation {corporation_id} is corrupt: {message}")]
    Corrupt {
        corporation_id: CorporationId,
        message: String,
    },

    #[error("Database error: {0}")]
    DbError(#[from] sqlx::Error),
}

impl ReconcileError {
    /// Classification of the upstream failure, when there was one.
    pub fn class(&self) -> Option<ErrorClass> {
        match self {
            ReconcileError::Aborted { source, .. } => Some(
                source
                    .downcast_ref::<EsiError>()
                    .map(EsiError::class)
                    .unwrap_or(ErrorClass::Unknown),
            ),
            ReconcileError::TimedOut { .. } => Some(ErrorClass::Transient),
            ReconcileError::Resolution(e) => e.class(),
            ReconcileError::Corrupt { .. } | ReconcileError::DbError(_) => None,
        }
    }

    /// Whether running again later may succeed.
    pub fn is_retryable(&self) -> bool {
        self.class().is_some_and(|c| c.is_retryable())
    }
}
