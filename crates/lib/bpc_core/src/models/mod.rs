//! Domain models.
//!
//! Plain data shared by the token, scope and reconciliation modules. Wire
//! formats for ESI live next to the client in [`crate::esi`].

pub mod blueprint;
pub mod reconcile;
pub mod session;
pub mod token;

pub use blueprint::{Blueprint, BlueprintKey};
pub use reconcile::{EventKind, ReconciliationEvent};
pub use session::{Identity, Session};
pub use token::{CharacterId, CharacterToken, CorporationId, Scope, ScopeSourcePair};
