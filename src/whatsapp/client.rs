use crate::config::TransportConfig;
use crate::errors::WahubError;
use crate::tenants::WhatsAppCredentials;
use crate::whatsapp::message::OutboundItem;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

const SERVICE: &str = "whatsapp";

/// Delivers one rendered outbound item and returns the provider message id.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        creds: &WhatsAppCredentials,
        to: &str,
        item: &OutboundItem,
    ) -> Result<String, WahubError>;
}

/// WhatsApp Cloud API messages endpoint.
pub struct CloudApiClient {
    client: Client,
    base_url: String,
    api_version: String,
}

impl CloudApiClient {
    pub fn new(config: &TransportConfig) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(config.send_timeout_secs))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_version: config.api_version.clone(),
        }
    }

    fn messages_url(&self, phone_number_id: &str) -> String {
        format!(
            "{}/{}/{}/messages",
            self.base_url, self.api_version, phone_number_id
        )
    }
}

#[async_trait]
impl Transport for CloudApiClient {
    async fn send(
        &self,
        creds: &WhatsAppCredentials,
        to: &str,
        item: &OutboundItem,
    ) -> Result<String, WahubError> {
        let payload = item.render(to);
        let url = self.messages_url(&creds.phone_number_id);
        debug!("sending {} message to {}", item.kind(), to);

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&creds.access_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| WahubError::transient(SERVICE, e))?;

        let status = resp.status();
        let retry_after = resp
            .headers()
            .get("retry-after")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok());
        let text = resp.text().await.unwrap_or_default();

        if status.is_success() {
            let json: Value = serde_json::from_str(&text)
                .map_err(|e| WahubError::transient(SERVICE, format!("unreadable response: {}", e)))?;
            return Ok(json
                .pointer("/messages/0/id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string());
        }

        let detail = error_detail(&text);
        warn!("whatsapp send failed ({}): {}", status, detail);
        Err(WahubError::from_status(
            SERVICE,
            status.as_u16(),
            retry_after,
            &detail,
        ))
    }
}

/// `error.message` from a Graph API error body, else the raw body.
pub(crate) fn error_detail(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}

#[cfg(test)]
mod tests;
