// @awa-component: ESI-SsoOAuth
//
//! EVE SSO OAuth support.
//!
//! PKCE helpers, the authorization URL, code exchange and token refresh
//! against the SSO v2 endpoints. The caller keeps the `state` and
//! `code_verifier` of an [`AuthorizationRequest`] until the callback.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::debug;
use url::Url;

use super::{EsiError, error_for_status, jwt};
use crate::config::SsoConfig;
use crate::models::{CharacterToken, Scope};

/// SSO v2 authorization endpoint.
pub const AUTHORIZE_URL: &str = "https://login.eveonline.com/v2/oauth/authorize";

/// SSO v2 token endpoint.
pub const TOKEN_URL: &str = "https://login.eveonline.com/v2/oauth/token";

// =============================================================================
// PKCE helpers
// =============================================================================

/// Random PKCE verifier: 32 bytes, base64url without padding (43 chars).
pub fn generate_code_verifier() -> String {
    use base64::Engine;
    use rand::RngCore;

    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// S256 challenge for `verifier`.
pub fn compute_code_challenge(verifier: &str) -> String {
    use base64::Engine;

    let digest = Sha256::digest(verifier.as_bytes());
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest)
}

/// Random value echoed back by the SSO on the callback.
pub fn generate_state() -> String {
    use base64::Engine;
    use rand::RngCore;

    let mut bytes = [0u8; 24];
    rand::rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

// =============================================================================
// Token endpoint
// =============================================================================

/// Response from the SSO token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct SsoTokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    pub expires_in: i64,
    pub refresh_token: Option<String>,
}

impl SsoTokenResponse {
    /// Absolute expiry. A nonsensical `expires_in` yields `now`, i.e. a
    /// token that is already stale.
    pub fn expires_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        TimeDelta::try_seconds(self.expires_in)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(now)
    }
}

/// A started authorization: where to send the user, and what to keep
/// until the callback arrives.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub url: Url,
    pub state: String,
    pub code_verifier: String,
}

/// Client for the SSO endpoints.
#[derive(Debug, Clone)]
pub struct SsoClient {
    http: reqwest::Client,
    config: SsoConfig,
    authorize_url: String,
    token_url: String,
}

impl SsoClient {
    pub fn new(config: SsoConfig, timeout: Duration) -> Result<Self, EsiError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            config,
            authorize_url: AUTHORIZE_URL.to_string(),
            token_url: TOKEN_URL.to_string(),
        })
    }

    /// Point the client at different endpoints (tests, Singularity).
    pub fn with_endpoints(
        mut self,
        authorize_url: impl Into<String>,
        token_url: impl Into<String>,
    ) -> Self {
        self.authorize_url = authorize_url.into();
        self.token_url = token_url.into();
        self
    }

    /// Build the URL that starts an authorization for `scopes`.
    pub fn authorize<'a>(
        &self,
        scopes: impl IntoIterator<Item = &'a Scope>,
    ) -> Result<AuthorizationRequest, EsiError> {
        let state = generate_state();
        let code_verifier = generate_code_verifier();
        let challenge = compute_code_challenge(&code_verifier);
        let scope = scopes
            .into_iter()
            .map(Scope::as_str)
            .collect::<Vec<_>>()
            .join(" ");

        let mut url = Url::parse(&self.authorize_url)?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("client_id", &self.config.client_id)
            .append_pair("scope", &scope)
            .append_pair("state", &state)
            .append_pair("code_challenge", &challenge)
            .append_pair("code_challenge_method", "S256");

        Ok(AuthorizationRequest {
            url,
            state,
            code_verifier,
        })
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_authorization_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<SsoTokenResponse, EsiError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("code_verifier", code_verifier),
        ];
        self.post_token_form(&params).await
    }

    /// Exchange a refresh token for a new access token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<SsoTokenResponse, EsiError> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];
        self.post_token_form(&params).await
    }

    async fn post_token_form(&self, params: &[(&str, &str)]) -> Result<SsoTokenResponse, EsiError> {
        debug!(url = %self.token_url, grant_type = params[0].1, "SSO token request");
        let resp = self
            .http
            .post(&self.token_url)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(params)
            .send()
            .await?;
        let resp = error_for_status(resp).await?;
        Ok(resp.json::<SsoTokenResponse>().await?)
    }
}

/// Build a [`CharacterToken`] from a fresh code-exchange response.
///
/// Character and scopes come from the access-token claims. The expiry is
/// the earlier of `expires_in` and the token's own `exp`.
pub fn token_from_response(
    response: SsoTokenResponse,
    now: DateTime<Utc>,
) -> Result<CharacterToken, EsiError> {
    let claims = jwt::decode_claims(&response.access_token)?;
    let expires_at = response.expires_at(now).min(claims.expires_at);
    let refresh_token = response
        .refresh_token
        .ok_or_else(|| EsiError::Decode("token response carried no refresh_token".into()))?;
    CharacterToken::new(
        claims.character_id,
        claims.character_name,
        response.access_token,
        refresh_token,
        expires_at,
        claims.scopes,
    )
    .map_err(|e| EsiError::InvalidToken(e.to_string()))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::esi::ErrorClass;
    use crate::esi::jwt::tests::fake_access_token;
    use wiremock::matchers::{body_string_contains, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sso(server: &MockServer) -> SsoClient {
        SsoClient::new(
            SsoConfig {
                client_id: "client".into(),
                client_secret: "secret".into(),
                redirect_uri: "http://localhost:2727/callback".into(),
            },
            Duration::from_secs(5),
        )
        .unwrap()
        .with_endpoints(
            format!("{}/v2/oauth/authorize", server.uri()),
            format!("{}/v2/oauth/token", server.uri()),
        )
    }

    #[test]
    fn code_challenge_is_s256_of_verifier() {
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        // RFC 7636 test vector
        assert_eq!(
            compute_code_challenge(verifier),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn code_verifier_is_url_safe() {
        let verifier = generate_code_verifier();
        assert!(verifier.len() >= 43);
        assert!(
            verifier
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
        assert_ne!(generate_state(), generate_state());
    }

    #[tokio::test]
    async fn authorize_url_carries_pkce_and_scopes() {
        let server = MockServer::start().await;
        let scopes = [
            Scope::from("esi-corporations.read_blueprints.v1"),
            Scope::from("esi-universe.read_structures.v1"),
        ];
        let req = sso(&server).authorize(scopes.iter()).unwrap();
        let pairs: std::collections::HashMap<_, _> = req.url.query_pairs().into_owned().collect();
        assert_eq!(pairs["response_type"], "code");
        assert_eq!(pairs["client_id"], "client");
        assert_eq!(pairs["state"], req.state);
        assert_eq!(pairs["code_challenge"], compute_code_challenge(&req.code_verifier));
        assert_eq!(
            pairs["scope"],
            "esi-corporations.read_blueprints.v1 esi-universe.read_structures.v1"
        );
    }

    #[tokio::test]
    async fn refresh_posts_form_with_basic_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/oauth/token"))
            .and(header_exists("authorization"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=old-refresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "new-access",
                "token_type": "Bearer",
                "expires_in": 1199,
                "refresh_token": "new-refresh"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let resp = sso(&server).refresh("old-refresh").await.unwrap();
        assert_eq!(resp.access_token, "new-access");
        assert_eq!(resp.refresh_token.as_deref(), Some("new-refresh"));
        assert_eq!(resp.expires_in, 1199);
    }

    #[tokio::test]
    async fn revoked_refresh_token_classifies_as_invalid_grant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/oauth/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "Invalid refresh token. Token missing/expired."
            })))
            .mount(&server)
            .await;

        let err = sso(&server).refresh("revoked").await.unwrap_err();
        assert_eq!(err.class(), ErrorClass::InvalidGrant);
    }

    #[tokio::test]
    async fn code_exchange_builds_character_token() {
        let server = MockServer::start().await;
        let access = fake_access_token(serde_json::json!({
            "sub": "CHARACTER:EVE:90000001",
            "name": "Pilot",
            "scp": ["esi-corporations.read_blueprints.v1"],
            "exp": (Utc::now() + TimeDelta::hours(1)).timestamp()
        }));
        Mock::given(method("POST"))
            .and(path("/v2/oauth/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": access,
                "token_type": "Bearer",
                "expires_in": 1199,
                "refresh_token": "refresh"
            })))
            .mount(&server)
            .await;

        let now = Utc::now();
        let resp = sso(&server)
            .exchange_authorization_code("code", "verifier")
            .await
            .unwrap();
        let token = token_from_response(resp, now).unwrap();
        assert_eq!(token.character_id, 90000001);
        assert_eq!(token.character_name, "Pilot");
        assert_eq!(token.expires_at, now + TimeDelta::seconds(1199));
        assert!(token.grants(&Scope::from("esi-corporations.read_blueprints.v1")));
    }

    #[test]
    fn claim_expiry_caps_expires_in() {
        let now = Utc::now();
        let exp = now.timestamp() + 60;
        let access = fake_access_token(serde_json::json!({
            "sub": "CHARACTER:EVE:1",
            "scp": "esi-corporations.read_blueprints.v1",
            "exp": exp
        }));
        let resp = SsoTokenResponse {
            access_token: access,
            token_type: "Bearer".into(),
            expires_in: 1199,
            refresh_token: Some("r".into()),
        };
        let token = token_from_response(resp, now).unwrap();
        assert_eq!(token.expires_at.timestamp(), exp);
        assert!(token.expires_at < now + TimeDelta::seconds(1199));
    }

    #[test]
    fn token_without_scopes_is_not_built() {
        let access = fake_access_token(serde_json::json!({
            "sub": "CHARACTER:EVE:1",
            "exp": 1_760_000_000
        }));
        let resp = SsoTokenResponse {
            access_token: access,
            token_type: "Bearer".into(),
            expires_in: 1199,
            refresh_token: Some("r".into()),
        };
        assert!(matches!(
            token_from_response(resp, Utc::now()),
            Err(EsiError::InvalidToken(_))
        ));
    }
}
