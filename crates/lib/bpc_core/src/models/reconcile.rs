//! Reconciliation events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::blueprint::Blueprint;
use super::token::CorporationId;

/// What happened to a blueprint between two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Added,
    Changed,
    Removed,
}

impl EventKind {
    /// Database text representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Added => "added",
            EventKind::Changed => "changed",
            EventKind::Removed => "removed",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One detected change. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationEvent {
    pub id: Uuid,
    pub corporation_id: CorporationId,
    pub kind: EventKind,
    /// Stored record; `None` for [`EventKind::Added`].
    pub before: Option<Blueprint>,
    /// Fetched record; `None` for [`EventKind::Removed`].
    pub after: Option<Blueprint>,
    pub observed_at: DateTime<Utc>,
}

impl ReconciliationEvent {
    /// The record this event is about, preferring the fetched side.
    pub fn subject(&self) -> Option<&Blueprint> {
        self.after.as_ref().or(self.before.as_ref())
    }
}
