use crate::config::ServicesConfig;
use crate::errors::WahubError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const SERVICE: &str = "places";

/// A place returned by a name or category search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub name: String,
    #[serde(default)]
    pub formatted_address: String,
    #[serde(default)]
    pub place_id: String,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default, alias = "formatted_phone_number")]
    pub phone: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
}

#[async_trait]
pub trait PlacesProvider: Send + Sync {
    /// Free-text search, optionally biased towards a coordinate.
    async fn search(
        &self,
        api_key: &str,
        query: &str,
        near: Option<(f64, f64)>,
    ) -> Result<Vec<Place>, WahubError>;
}

#[derive(Debug, Deserialize)]
struct TextSearchResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    results: Vec<Place>,
    #[serde(default)]
    error_message: Option<String>,
}

/// Google Places Text Search.
pub struct GooglePlaces {
    client: Client,
    base_url: String,
    region: String,
}

/// Search radius used when a coordinate is supplied (metres).
const SEARCH_RADIUS_M: u32 = 3000;
pub const MAX_RESULTS: usize = 5;

impl GooglePlaces {
    pub fn new(config: &ServicesConfig) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            base_url: config.places_base_url.trim_end_matches('/').to_string(),
            region: config.default_region.clone(),
        }
    }
}

#[async_trait]
impl PlacesProvider for GooglePlaces {
    async fn search(
        &self,
        api_key: &str,
        query: &str,
        near: Option<(f64, f64)>,
    ) -> Result<Vec<Place>, WahubError> {
        if api_key.is_empty() {
            return Err(WahubError::Config("maps API key is not configured".into()));
        }
        let mut req = self
            .client
            .get(format!("{}/textsearch/json", self.base_url))
            .query(&[
                ("query", query),
                ("region", self.region.as_str()),
                ("key", api_key),
            ]);
        if let Some((lat, lng)) = near {
            req = req.query(&[
                ("location", format!("{},{}", lat, lng)),
                ("radius", SEARCH_RADIUS_M.to_string()),
            ]);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| WahubError::transient(SERVICE, e))?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(WahubError::from_status(SERVICE, status.as_u16(), None, &text));
        }
        let body: TextSearchResponse = resp
            .json()
            .await
            .map_err(|e| WahubError::transient(SERVICE, format!("unreadable response: {}", e)))?;

        let detail = body.error_message.unwrap_or_default();
        match body.status.as_str() {
            "OK" => {
                debug!("places search '{}' returned {} result(s)", query, body.results.len());
                Ok(body.results.into_iter().take(MAX_RESULTS).collect())
            }
            "ZERO_RESULTS" => Ok(Vec::new()),
            "OVER_QUERY_LIMIT" => Err(WahubError::RateLimit { retry_after: None }),
            "REQUEST_DENIED" => Err(WahubError::Auth(format!("places: {}", detail))),
            "INVALID_REQUEST" => Err(WahubError::permanent(SERVICE, 400, &detail)),
            other => {
                warn!("places search returned status {}: {}", other, detail);
                Err(WahubError::transient(SERVICE, format!("{} {}", other, detail)))
            }
        }
    }
}

#[cfg(test)]
mod tests;
