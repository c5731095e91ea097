// @awa-component: SCP-ScopeTable
//
//! Scope requirements and resolution.
//!
//! Each privileged operation needs a fixed set of SSO scopes. The
//! [`resolver::ScopeResolver`] finds characters whose tokens together cover
//! such a set.

pub mod resolver;

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::esi::ErrorClass;
use crate::models::{CharacterId, Scope};
use crate::tokens::TokenError;

pub use resolver::ScopeResolver;

pub const READ_CORPORATION_ASSETS: &str = "esi-assets.read_corporation_assets.v1";
pub const READ_CORPORATION_BLUEPRINTS: &str = "esi-corporations.read_blueprints.v1";
pub const READ_CORPORATION_DIVISIONS: &str = "esi-corporations.read_divisions.v1";
pub const READ_CORPORATION_JOBS: &str = "esi-industry.read_corporation_jobs.v1";
pub const READ_STRUCTURES: &str = "esi-universe.read_structures.v1";

/// Privileged operations, each with a static scope requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CorporationAssets,
    CorporationBlueprints,
    CorporationDivisions,
    CorporationIndustryJobs,
    UniverseStructures,
    /// Everything the corporation dashboard reads.
    Admin,
}

impl Operation {
    pub const ALL: [Operation; 6] = [
        Operation::CorporationAssets,
        Operation::CorporationBlueprints,
        Operation::CorporationDivisions,
        Operation::CorporationIndustryJobs,
        Operation::UniverseStructures,
        Operation::Admin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::CorporationAssets => "corporation-assets",
            Operation::CorporationBlueprints => "corporation-blueprints",
            Operation::CorporationDivisions => "corporation-divisions",
            Operation::CorporationIndustryJobs => "corporation-industry-jobs",
            Operation::UniverseStructures => "universe-structures",
            Operation::Admin => "admin",
        }
    }

    /// Scope names this operation needs.
    pub fn scope_names(&self) -> &'static [&'static str] {
        match self {
            Operation::CorporationAssets => &[READ_CORPORATION_ASSETS],
            Operation::CorporationBlueprints => &[READ_CORPORATION_BLUEPRINTS],
            Operation::CorporationDivisions => &[READ_CORPORATION_DIVISIONS],
            Operation::CorporationIndustryJobs => &[READ_CORPORATION_JOBS],
            Operation::UniverseStructures => &[READ_STRUCTURES],
            Operation::Admin => &[
                READ_CORPORATION_ASSETS,
                READ_CORPORATION_BLUEPRINTS,
                READ_CORPORATION_DIVISIONS,
                READ_CORPORATION_JOBS,
                READ_STRUCTURES,
            ],
        }
    }

    pub fn required_scopes(&self) -> BTreeSet<Scope> {
        self.scope_names().iter().map(|s| Scope::from(*s)).collect()
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| format!("unknown operation '{s}'"))
    }
}

/// Scope resolution errors.
#[derive(Debug, Error)]
pub enum ResolutionError {
    /// No remaining character grants `scope`. Surfaced to the initiator as
    /// "not authorized for this action"; not retried automatically.
    #[error("No linked character grants scope {scope}")]
    NoCoverage { scope: Scope },

    /// A needed refresh failed transiently. Retry later.
    #[error("Transient failure refreshing character {character_id}: {message}")]
    Transient {
        character_id: CharacterId,
        message: String,
    },

    #[error("Token store error: {0}")]
    Store(#[from] TokenError),
}

impl ResolutionError {
    /// Whether the caller lacks authorization rather than hitting a fault.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ResolutionError::NoCoverage { .. })
    }

    pub fn class(&self) -> Option<ErrorClass> {
        match self {
            ResolutionError::Transient { .. } => Some(ErrorClass::Transient),
            _ => None,
        }
    }
}
