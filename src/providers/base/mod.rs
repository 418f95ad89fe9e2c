use crate::errors::WahubError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

#[derive(Debug, Clone, Default)]
pub struct LLMResponse {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCallRequest>,
    /// Input token count reported by the provider (if available).
    pub input_tokens: Option<u64>,
    /// Output token count reported by the provider (if available).
    pub output_tokens: Option<u64>,
}

impl LLMResponse {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Message {
    pub role: String,
    pub content: String,
    pub tool_calls: Option<Vec<ToolCallRequest>>,
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn assistant(content: impl Into<String>, tool_calls: Option<Vec<ToolCallRequest>>) -> Self {
        Self {
            role: "assistant".into(),
            content: content.into(),
            tool_calls,
            ..Default::default()
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: "tool".into(),
            content: content.into(),
            tool_call_id: Some(tool_call_id.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value, // JSON Schema
}

/// Backoff for provider calls. The whole exchange also sits under the
/// orchestrator's per-call timeout, so the budget here stays small.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: usize,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 1,
            initial_delay_ms: 500,
            max_delay_ms: 5000,
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (1-based). A server `retry-after`
    /// hint wins over the doubling schedule; both are capped.
    pub fn delay_for(&self, attempt: usize, retry_after_secs: Option<u64>) -> Duration {
        let ms = match retry_after_secs {
            Some(secs) => secs.saturating_mul(1000).min(self.max_delay_ms),
            None => {
                let shift = u32::try_from(attempt.saturating_sub(1)).unwrap_or(u32::MAX).min(16);
                let base = self
                    .initial_delay_ms
                    .saturating_mul(1 << shift)
                    .min(self.max_delay_ms);
                base + base / 4 * u64::from(fastrand::u8(..=100)) / 100
            }
        };
        Duration::from_millis(ms)
    }
}

/// How a failed provider call should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryVerdict {
    GiveUp,
    Retry { retry_after_secs: Option<u64> },
}

/// Classify a provider error. Untyped failures come from the connection
/// layer and get another try.
pub fn retry_verdict(err: &anyhow::Error) -> RetryVerdict {
    match err.downcast_ref::<WahubError>() {
        Some(WahubError::RateLimit { retry_after }) => RetryVerdict::Retry {
            retry_after_secs: *retry_after,
        },
        Some(e) if !e.is_retryable() => RetryVerdict::GiveUp,
        _ => RetryVerdict::Retry {
            retry_after_secs: None,
        },
    }
}

/// Parameters for a chat request to an LLM provider.
#[derive(Debug, Clone)]
pub struct ChatRequest<'a> {
    pub messages: Vec<Message>,
    pub tools: Option<Vec<ToolDefinition>>,
    pub model: Option<&'a str>,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Tool choice mode: "auto" (default), "required" or "none".
    pub tool_choice: Option<String>,
}

#[async_trait]
pub trait LLMProvider: Send + Sync {
    async fn chat(&self, req: ChatRequest<'_>) -> anyhow::Result<LLMResponse>;

    fn default_model(&self) -> &str;

    /// Chat with retry on transient and rate-limit errors.
    async fn chat_with_retry(
        &self,
        req: ChatRequest<'_>,
        retry_config: Option<RetryConfig>,
    ) -> anyhow::Result<LLMResponse> {
        let config = retry_config.unwrap_or_default();
        let mut attempt = 0;
        loop {
            let err = match self.chat(req.clone()).await {
                Ok(response) => return Ok(response),
                Err(e) => e,
            };
            let verdict = retry_verdict(&err);
            let RetryVerdict::Retry { retry_after_secs } = verdict else {
                debug!("model call failed permanently: {}", err);
                return Err(err);
            };
            if attempt >= config.max_retries {
                return Err(err);
            }
            attempt += 1;
            let delay = config.delay_for(attempt, retry_after_secs);
            warn!(
                "model call failed ({}), retry {}/{} in {:?}",
                err, attempt, config.max_retries, delay
            );
            tokio::time::sleep(delay).await;
        }
    }
}
