use crate::providers::base::{ChatRequest, LLMProvider, LLMResponse, ToolCallRequest};
use crate::providers::errors::ProviderErrorHandler;
use crate::providers::provider_http_client;
use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

const PROVIDER_NAME: &str = "OpenAI";

pub struct OpenAIProvider {
    api_key: String,
    default_model: String,
    endpoint: String,
    client: Client,
}

impl OpenAIProvider {
    /// `base_url` is the API root, e.g. `https://api.openai.com/v1`.
    pub fn new(
        api_key: String,
        default_model: String,
        base_url: String,
        request_timeout: Duration,
    ) -> Self {
        Self {
            api_key,
            default_model,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            client: provider_http_client(request_timeout),
        }
    }

    fn parse_response(json: &Value) -> Result<LLMResponse> {
        let choice = json["choices"]
            .as_array()
            .and_then(|arr| arr.first())
            .ok_or_else(|| {
                crate::errors::WahubError::transient("llm", "no choices in response")
            })?;

        let message = &choice["message"];
        let content = message["content"]
            .as_str()
            .filter(|s| !s.is_empty())
            .map(std::string::ToString::to_string);

        let mut tool_calls = Vec::new();
        if let Some(tool_calls_array) = message["tool_calls"].as_array() {
            for tc in tool_calls_array {
                if let Some(function) = tc["function"].as_object() {
                    let arguments = function["arguments"]
                        .as_str()
                        .and_then(|s| serde_json::from_str(s).ok())
                        .unwrap_or_else(|| json!({}));

                    tool_calls.push(ToolCallRequest {
                        id: tc["id"].as_str().unwrap_or("").to_string(),
                        name: function["name"].as_str().unwrap_or("").to_string(),
                        arguments,
                    });
                }
            }
        }

        let usage = &json["usage"];
        Ok(LLMResponse {
            content,
            tool_calls,
            input_tokens: usage["prompt_tokens"].as_u64(),
            output_tokens: usage["completion_tokens"].as_u64(),
        })
    }
}

/// Temperature rounded to two decimals, so `0.7f32` goes out as `0.7`.
fn wire_temperature(temperature: f32) -> f64 {
    (f64::from(temperature) * 100.0).round() / 100.0
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    async fn chat(&self, req: ChatRequest<'_>) -> Result<LLMResponse> {
        let openai_messages: Vec<Value> = req
            .messages
            .into_iter()
            .map(|msg| {
                let mut m = json!({
                    "role": msg.role,
                    "content": msg.content,
                });

                if let Some(tool_calls) = msg.tool_calls {
                    m["tool_calls"] = json!(
                        tool_calls
                            .into_iter()
                            .map(|tc| {
                                let args_str = serde_json::to_string(&tc.arguments)
                                    .unwrap_or_else(|_| "{}".to_string());
                                json!({
                                    "id": tc.id,
                                    "type": "function",
                                    "function": {
                                        "name": tc.name,
                                        "arguments": args_str
                                    }
                                })
                            })
                            .collect::<Vec<_>>()
                    );
                }

                if let Some(tool_call_id) = msg.tool_call_id {
                    m["tool_call_id"] = json!(tool_call_id);
                }

                m
            })
            .collect();

        let mut payload = json!({
            "model": req.model.unwrap_or(&self.default_model),
            "messages": openai_messages,
            "max_tokens": req.max_tokens,
            "temperature": wire_temperature(req.temperature),
        });

        if let Some(tools) = req.tools.filter(|t| !t.is_empty()) {
            payload["tools"] = json!(
                tools
                    .into_iter()
                    .map(|t| json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters
                        }
                    }))
                    .collect::<Vec<_>>()
            );
            payload["tool_choice"] = json!(req.tool_choice.as_deref().unwrap_or("auto"));
        }

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| crate::errors::WahubError::transient("llm", e))?;

        let json = ProviderErrorHandler::check_response(resp, PROVIDER_NAME).await?;
        let parsed = Self::parse_response(&json)?;
        debug!(
            "{} response: {} tool call(s), tokens in={:?} out={:?}",
            PROVIDER_NAME,
            parsed.tool_calls.len(),
            parsed.input_tokens,
            parsed.output_tokens
        );
        Ok(parsed)
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }
}

#[cfg(test)]
mod tests;
