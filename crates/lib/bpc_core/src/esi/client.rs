//! ESI resource client.
//!
//! Only the endpoints the engine consumes are wrapped. Paged collections
//! are walked using the `X-Pages` response header.

use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use super::{EsiError, error_for_status};
use crate::models::{Blueprint, CharacterId, CorporationId};

/// Public ESI base URL.
pub const ESI_BASE_URL: &str = "https://esi.evetech.net/latest";

const DATASOURCE: &str = "tranquility";
const PAGES_HEADER: &str = "x-pages";

#[derive(Debug, Deserialize)]
struct CharacterPublic {
    corporation_id: CorporationId,
}

/// Typed ESI client.
#[derive(Debug, Clone)]
pub struct EsiClient {
    http: reqwest::Client,
    base_url: String,
}

impl EsiClient {
    pub fn new(timeout: Duration) -> Result<Self, EsiError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("brave-bpc/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: ESI_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// The character's current corporation, via `GET /characters/{character_id}/`.
    pub async fn character_corporation(
        &self,
        character_id: CharacterId,
    ) -> Result<CorporationId, EsiError> {
        let url = format!("{}/characters/{character_id}/", self.base_url);
        let resp = self
            .http
            .get(&url)
            .query(&[("datasource", DATASOURCE)])
            .send()
            .await?;
        let resp = error_for_status(resp).await?;
        Ok(resp.json::<CharacterPublic>().await?.corporation_id)
    }

    /// `GET /corporations/{corporation_id}/blueprints/`, all pages.
    ///
    /// Requires `esi-corporations.read_blueprints.v1` on `access_token`.
    pub async fn corporation_blueprints(
        &self,
        corporation_id: CorporationId,
        access_token: &str,
    ) -> Result<Vec<Blueprint>, EsiError> {
        let url = format!("{}/corporations/{corporation_id}/blueprints/", self.base_url);
        let mut blueprints = Vec::new();
        let mut page: u32 = 1;
        loop {
            let page_param = page.to_string();
            let resp = self
                .http
                .get(&url)
                .bearer_auth(access_token)
                .query(&[("datasource", DATASOURCE), ("page", page_param.as_str())])
                .send()
                .await?;
            let resp = error_for_status(resp).await?;
            let pages = resp
                .headers()
                .get(PAGES_HEADER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(1);
            let batch = resp.json::<Vec<Blueprint>>().await?;
            debug!(corporation_id, page, pages, count = batch.len(), "fetched blueprint page");
            blueprints.extend(batch);
            if page >= pages {
                break;
            }
            page += 1;
        }
        Ok(blueprints)
    }
}
