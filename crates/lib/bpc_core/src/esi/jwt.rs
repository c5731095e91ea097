//! EVE SSO access-token claims.
//!
//! SSO v2 access tokens are JWTs naming the character (`sub` is
//! `CHARACTER:EVE:<id>`) and the granted scopes (`scp`, a string when one
//! scope was granted, an array otherwise). The token arrived directly from
//! the SSO token endpoint over TLS, so only the claims are decoded here;
//! the signature is not re-checked.

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

use super::EsiError;
use crate::models::{CharacterId, Scope};

const SUBJECT_PREFIX: &str = "CHARACTER:EVE:";

/// `scp` is a bare string for single-scope grants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum ScopeClaim {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawClaims {
    sub: String,
    #[serde(default)]
    name: String,
    scp: Option<ScopeClaim>,
    exp: i64,
}

/// Decoded access-token claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SsoClaims {
    pub character_id: CharacterId,
    pub character_name: String,
    pub scopes: Vec<Scope>,
    pub expires_at: DateTime<Utc>,
}

/// Decode the claims of an SSO access token.
pub fn decode_claims(access_token: &str) -> Result<SsoClaims, EsiError> {
    let mut validation = Validation::new(Algorithm::RS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let raw = decode::<RawClaims>(access_token, &DecodingKey::from_secret(&[]), &validation)
        .map_err(|e| EsiError::InvalidToken(format!("jwt decode: {e}")))?
        .claims;

    let character_id = raw
        .sub
        .strip_prefix(SUBJECT_PREFIX)
        .and_then(|id| id.parse::<CharacterId>().ok())
        .ok_or_else(|| EsiError::InvalidToken(format!("unexpected subject '{}'", raw.sub)))?;

    let scopes = match raw.scp {
        Some(ScopeClaim::One(s)) => vec![Scope::from(s)],
        Some(ScopeClaim::Many(v)) => v.into_iter().map(Scope::from).collect(),
        None => Vec::new(),
    };

    let expires_at = Utc
        .timestamp_opt(raw.exp, 0)
        .single()
        .ok_or_else(|| EsiError::InvalidToken(format!("bad exp {}", raw.exp)))?;

    Ok(SsoClaims {
        character_id,
        character_name: raw.name,
        scopes,
        expires_at,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};

    /// Build an unsigned-in-spirit token with the given claims.
    pub(crate) fn fake_access_token(claims: serde_json::Value) -> String {
        encode(&Header::default(), &claims, &EncodingKey::from_secret(b"test")).unwrap()
    }

    #[test]
    fn decodes_multi_scope_token() {
        let token = fake_access_token(serde_json::json!({
            "sub": "CHARACTER:EVE:2112625428",
            "name": "Zoe Yamamoto",
            "scp": ["esi-corporations.read_blueprints.v1", "esi-universe.read_structures.v1"],
            "exp": 1_760_000_000,
            "aud": ["client-id", "EVE Online"],
            "iss": "https://login.eveonline.com"
        }));
        let claims = decode_claims(&token).unwrap();
        assert_eq!(claims.character_id, 2112625428);
        assert_eq!(claims.character_name, "Zoe Yamamoto");
        assert_eq!(claims.scopes.len(), 2);
        assert_eq!(claims.expires_at.timestamp(), 1_760_000_000);
    }

    #[test]
    fn decodes_single_scope_string() {
        let token = fake_access_token(serde_json::json!({
            "sub": "CHARACTER:EVE:1",
            "name": "A",
            "scp": "esi-corporations.read_blueprints.v1",
            "exp": 1_760_000_000
        }));
        let claims = decode_claims(&token).unwrap();
        assert_eq!(
            claims.scopes,
            vec![Scope::from("esi-corporations.read_blueprints.v1")]
        );
    }

    #[test]
    fn rejects_non_character_subject() {
        let token = fake_access_token(serde_json::json!({
            "sub": "CORPORATION:EVE:98000001",
            "exp": 1_760_000_000
        }));
        assert!(matches!(decode_claims(&token), Err(EsiError::InvalidToken(_))));
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(decode_claims("not-a-jwt"), Err(EsiError::InvalidToken(_))));
    }
}
