//! # bpc_core
//!
//! Token-scope resolution and blueprint reconciliation for Brave BPC.
//!
//! Members link characters through EVE SSO. Every linked character
//! contributes the scopes it was granted, and the corporation-wide
//! operations draw on the union of those scopes:
//!
//! - [`tokens`] keeps the per-character token pool and refreshes tokens,
//! - [`scopes`] picks a covering set of characters for a scope set,
//! - [`reconcile`] diffs fetched blueprint snapshots against stored ones,
//! - [`esi`] talks to SSO and ESI and classifies their failures,
//! - [`session`] maps opaque session keys to character identities.

pub mod config;
pub mod esi;
pub mod ids;
pub mod models;
pub mod reconcile;
pub mod scopes;
pub mod session;
pub mod skew;
pub mod tokens;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_empty() {
        assert!(!version().is_empty());
    }
}
