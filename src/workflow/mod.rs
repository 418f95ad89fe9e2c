//! Deal submissions handed to the external publishing workflow, plus the
//! status callbacks it sends back.

pub mod submissions;

pub use submissions::DealSubmissions;

use crate::config::ServicesConfig;
use crate::errors::WahubError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

const SERVICE: &str = "workflow";

/// Approved deal as posted to the workflow webhook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealPayload {
    pub deal_id: String,
    pub tenant_id: String,
    pub submitted_by: String,
    pub restaurant_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub description: String,
    pub pricing: String,
    pub validity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_media_id: Option<String>,
    pub audience: String,
    pub contact: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_notes: Option<String>,
    pub marketing_copy: String,
    /// Where the workflow reports progress.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
}

/// Body of `POST /api/n8n/status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCallback {
    pub deal_id: String,
    pub status: String,
    #[serde(default)]
    pub platforms_posted: Vec<String>,
    #[serde(default)]
    pub platforms_failed: Vec<String>,
}

/// Stored submission with the latest workflow status.
#[derive(Debug, Clone, PartialEq)]
pub struct DealSubmission {
    pub payload: DealPayload,
    pub status: String,
    pub platforms_posted: Vec<String>,
    pub platforms_failed: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl DealSubmission {
    pub const STATUS_SUBMITTED: &'static str = "submitted";
    pub const STATUS_SUBMIT_FAILED: &'static str = "submit_failed";

    pub fn new(payload: DealPayload) -> Self {
        Self {
            payload,
            status: Self::STATUS_SUBMITTED.to_string(),
            platforms_posted: Vec::new(),
            platforms_failed: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    /// Text sent to the submitter when the workflow reports progress.
    pub fn status_summary(&self) -> String {
        let mut out = format!(
            "Update on your deal for {}: {}",
            self.payload.restaurant_name,
            self.status.replace('_', " ")
        );
        if !self.platforms_posted.is_empty() {
            out.push_str(&format!("\nPosted on: {}", self.platforms_posted.join(", ")));
        }
        if !self.platforms_failed.is_empty() {
            out.push_str(&format!(
                "\nCould not post on: {}",
                self.platforms_failed.join(", ")
            ));
        }
        out
    }
}

/// One-way hand-off to the publishing workflow.
#[async_trait]
pub trait WorkflowRunner: Send + Sync {
    async fn submit(&self, webhook_url: &str, payload: &DealPayload) -> Result<(), WahubError>;
}

pub struct HttpWorkflowRunner {
    client: Client,
}

impl HttpWorkflowRunner {
    pub fn new() -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client }
    }
}

impl Default for HttpWorkflowRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkflowRunner for HttpWorkflowRunner {
    async fn submit(&self, webhook_url: &str, payload: &DealPayload) -> Result<(), WahubError> {
        if webhook_url.is_empty() {
            return Err(WahubError::Config("workflow webhook URL is not configured".into()));
        }
        let resp = self
            .client
            .post(webhook_url)
            .json(payload)
            .send()
            .await
            .map_err(|e| WahubError::transient(SERVICE, e))?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(WahubError::from_status(SERVICE, status.as_u16(), None, &text));
        }
        info!("deal {} handed to workflow", payload.deal_id);
        Ok(())
    }
}

/// Webhook URL for a tenant: its own override, else the global one.
pub fn webhook_url_for<'a>(
    tenant_override: Option<&'a str>,
    config: &'a ServicesConfig,
) -> &'a str {
    tenant_override
        .filter(|u| !u.is_empty())
        .unwrap_or(&config.workflow_webhook_url)
}

/// Callback endpoint advertised to the workflow.
pub fn callback_url(config: &ServicesConfig) -> Option<String> {
    let base = config.callback_base_url.trim_end_matches('/');
    (!base.is_empty()).then(|| format!("{}/api/n8n/status", base))
}

#[cfg(test)]
mod tests;
