use crate::errors::WahubError;
use serde_json::Value;
use tracing::warn;

const SERVICE: &str = "llm";

/// Common error handling for OpenAI-compatible providers.
pub struct ProviderErrorHandler;

impl ProviderErrorHandler {
    /// Pull `error.type` / `error.message` out of an OpenAI-style error body.
    pub fn api_error_detail(error_text: &str) -> String {
        if let Ok(error_json) = serde_json::from_str::<Value>(error_text)
            && let Some(err) = error_json.get("error")
        {
            if let Some(msg) = err.as_str() {
                return msg.to_string();
            }
            let error_type = err
                .get("type")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown");
            let error_msg = err
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or("Unknown error");
            return format!("{}: {}", error_type, error_msg);
        }
        error_text.to_string()
    }

    /// Check HTTP status and return a typed error if the response is not successful.
    pub async fn check_http_status(
        resp: reqwest::Response,
        provider: &str,
    ) -> Result<reqwest::Response, WahubError> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status().as_u16();
        let retry_after = resp
            .headers()
            .get("retry-after")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok());
        let error_text = resp
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());

        warn!("{} provider returned HTTP {}", provider, status);
        Err(WahubError::from_status(
            SERVICE,
            status,
            retry_after,
            &Self::api_error_detail(&error_text),
        ))
    }

    /// Check an HTTP response for errors. Returns the body as JSON on success.
    pub async fn check_response(
        resp: reqwest::Response,
        provider: &str,
    ) -> Result<Value, WahubError> {
        let resp = Self::check_http_status(resp, provider).await?;

        let json: Value = resp.json().await.map_err(|e| {
            WahubError::transient(SERVICE, format!("unreadable {} response: {}", provider, e))
        })?;

        // Some compatible gateways report failures with a 200 status.
        if let Some(error_val) = json.get("error") {
            let detail = Self::api_error_detail(&serde_json::json!({ "error": error_val }).to_string());
            warn!("{} provider reported an error in a 200 response", provider);
            return Err(WahubError::transient(SERVICE, detail));
        }

        Ok(json)
    }
}
