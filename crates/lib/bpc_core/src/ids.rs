// @awa-component: ID-Issuer
//
// Identifiers for reconciliation events are UUIDv7 so that rows sort by
// creation time without a separate sequence. Postgres cannot generate v7
// itself, so they are issued app-side.

use uuid::Uuid;

/// Generate a new UUIDv7 (timestamp-sortable).
pub fn uuidv7() -> Uuid {
    Uuid::now_v7()
}

/// Issues process-wide unique, time-ordered identifiers for new records.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentifierIssuer;

impl IdentifierIssuer {
    pub fn new() -> Self {
        Self
    }

    /// Issue the next identifier. Later calls sort after earlier ones.
    pub fn issue(&self) -> Uuid {
        uuidv7()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuidv7_is_valid() {
        let id = uuidv7();
        assert_eq!(id.get_version(), Some(uuid::Version::SortRand));
    }

    #[test]
    fn issued_ids_are_ordered_and_unique() {
        let issuer = IdentifierIssuer::new();
        let ids: Vec<Uuid> = (0..64).map(|_| issuer.issue()).collect();
        for pair in ids.windows(2) {
            assert!(pair[1] > pair[0], "{} !> {}", pair[1], pair[0]);
        }
    }
}
