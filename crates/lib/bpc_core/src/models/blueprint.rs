// @awa-component: REC-Blueprint
//
//! Corporation blueprint records as returned by
//! `GET /corporations/{corporation_id}/blueprints/`.

use serde::{Deserialize, Serialize};

/// One blueprint owned by a corporation.
///
/// `type_id`, `location_id` and `quantity` identify the record; the
/// efficiency and run fields are its mutable quality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blueprint {
    /// Unique item ID. Not stable across moves, so not part of the key.
    #[serde(default)]
    pub item_id: i64,
    pub type_id: i32,
    pub location_id: i64,
    #[serde(default)]
    pub location_flag: String,
    /// `-1` for an original, `-2` for a copy, otherwise a stack size.
    pub quantity: i32,
    pub material_efficiency: i32,
    pub time_efficiency: i32,
    /// `-1` for an original (unlimited runs).
    pub runs: i32,
}

/// Identity of a blueprint record: two records with equal keys are the
/// same logical entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlueprintKey {
    pub type_id: i32,
    pub location_id: i64,
    pub quantity: i32,
}

impl Blueprint {
    pub fn identity_key(&self) -> BlueprintKey {
        BlueprintKey {
            type_id: self.type_id,
            location_id: self.location_id,
            quantity: self.quantity,
        }
    }

    /// Equality on the quality fields.
    ///
    /// A stored record with the same identity key and the same quality is
    /// unchanged; anything else about it (item ID, location flag) is noise.
    pub fn same_quality(&self, other: &Blueprint) -> bool {
        self.type_id == other.type_id
            && self.material_efficiency == other.material_efficiency
            && self.time_efficiency == other.time_efficiency
            && self.runs == other.runs
    }

    pub fn is_original(&self) -> bool {
        self.quantity == -1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bp(type_id: i32, location_id: i64, quantity: i32, me: i32, te: i32, runs: i32) -> Blueprint {
        Blueprint {
            item_id: 0,
            type_id,
            location_id,
            location_flag: "CorpSAG1".into(),
            quantity,
            material_efficiency: me,
            time_efficiency: te,
            runs,
        }
    }

    #[test]
    fn identity_ignores_quality() {
        let a = bp(1, 10, 1, 10, 20, 5);
        let b = bp(1, 10, 1, 0, 0, 1);
        assert_eq!(a.identity_key(), b.identity_key());
        assert!(!a.same_quality(&b));
    }

    #[test]
    fn quality_ignores_location() {
        let a = bp(1, 10, 1, 10, 20, 5);
        let b = bp(1, 99, -2, 10, 20, 5);
        assert_ne!(a.identity_key(), b.identity_key());
        assert!(a.same_quality(&b));
    }

    #[test]
    fn item_id_and_flag_are_noise() {
        let a = bp(1, 10, 1, 10, 20, 5);
        let mut b = a.clone();
        b.item_id = 1234;
        b.location_flag = "CorpSAG2".into();
        assert_eq!(a.identity_key(), b.identity_key());
        assert!(a.same_quality(&b));
    }

    #[test]
    fn deserializes_esi_payload() {
        let json = r#"{
            "item_id": 1000000010495,
            "location_flag": "CorpSAG1",
            "location_id": 60014719,
            "material_efficiency": 10,
            "quantity": -1,
            "runs": -1,
            "time_efficiency": 20,
            "type_id": 691
        }"#;
        let bp: Blueprint = serde_json::from_str(json).unwrap();
        assert_eq!(bp.type_id, 691);
        assert!(bp.is_original());
        assert_eq!(bp.identity_key().location_id, 60014719);
    }
}
