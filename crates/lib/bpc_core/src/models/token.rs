// @awa-component: TOK-Model
//
//! Character tokens and the scopes they grant.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tokens::TokenError;

/// EVE character ID.
pub type CharacterId = i64;

/// EVE corporation ID.
pub type CorporationId = i64;

/// An SSO scope identifier, e.g. `esi-corporations.read_blueprints.v1`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scope(String);

impl Scope {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Scope {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Scope {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// OAuth credentials for one character, plus the scopes granted at
/// authorization time.
///
/// The scope set is fixed until the character re-authorizes and is never
/// empty; [`CharacterToken::new`] rejects an empty grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterToken {
    pub character_id: CharacterId,
    pub character_name: String,
    /// Corporation the character belonged to when it was linked.
    pub corporation_id: Option<CorporationId>,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    granted_scopes: BTreeSet<Scope>,
}

impl CharacterToken {
    pub fn new(
        character_id: CharacterId,
        character_name: impl Into<String>,
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_at: DateTime<Utc>,
        scopes: impl IntoIterator<Item = Scope>,
    ) -> Result<Self, TokenError> {
        let granted_scopes: BTreeSet<Scope> = scopes.into_iter().collect();
        if granted_scopes.is_empty() {
            return Err(TokenError::NoScopes { character_id });
        }
        Ok(Self {
            character_id,
            character_name: character_name.into(),
            corporation_id: None,
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            expires_at,
            granted_scopes,
        })
    }

    pub fn with_corporation(mut self, corporation_id: CorporationId) -> Self {
        self.corporation_id = Some(corporation_id);
        self
    }

    pub fn granted_scopes(&self) -> &BTreeSet<Scope> {
        &self.granted_scopes
    }

    pub fn grants(&self, scope: &Scope) -> bool {
        self.granted_scopes.contains(scope)
    }

    pub fn grants_any(&self, scopes: &BTreeSet<Scope>) -> bool {
        scopes.iter().any(|s| self.granted_scopes.contains(s))
    }

    /// Number of `scopes` this token grants.
    pub fn coverage(&self, scopes: &BTreeSet<Scope>) -> usize {
        scopes.iter().filter(|s| self.granted_scopes.contains(*s)).count()
    }

    /// Copy of this token carrying freshly issued credentials.
    ///
    /// The refresh token is only replaced when the provider rotated it.
    pub fn refreshed(
        &self,
        access_token: String,
        expires_at: DateTime<Utc>,
        refresh_token: Option<String>,
    ) -> Self {
        Self {
            access_token,
            expires_at,
            refresh_token: refresh_token.unwrap_or_else(|| self.refresh_token.clone()),
            ..self.clone()
        }
    }
}

/// A scope bound to the character whose token will exercise it.
///
/// Produced by the scope resolver and consumed right away; never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeSourcePair {
    pub scope: Scope,
    pub character_id: CharacterId,
    pub access_token: String,
}
