//! Session records and caller identity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::token::CharacterId;

/// Server-side session state behind an opaque session key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub character_id: CharacterId,
    pub issued_at: DateTime<Utc>,
}

/// Who is making a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Identity {
    Anonymous,
    Authenticated { character_id: CharacterId },
}

impl Identity {
    pub fn character_id(&self) -> Option<CharacterId> {
        match self {
            Identity::Anonymous => None,
            Identity::Authenticated { character_id } => Some(*character_id),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Identity::Authenticated { .. })
    }
}
