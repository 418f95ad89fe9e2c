//! Bounded LLM tool-calling loop.
//!
//! Each turn gets at most `max_iterations` model calls inside a wall-clock
//! budget. The transcript is checked for tool-call pairing before every call
//! and every tool call the model makes gets exactly one tool result turn,
//! even when the budget runs out mid-batch.

use crate::agent::prompt::build_system_prompt;
use crate::agent::tools::{ToolContext, ToolRegistry, ToolResult};
use crate::config::AgentConfig;
use crate::outbound::OutboundPlan;
use crate::pos::Product;
use crate::providers::ProviderSource;
use crate::providers::base::{ChatRequest, LLMResponse, Message, RetryConfig, ToolCallRequest};
use crate::session::record::{ConversationRecord, Turn};
use crate::session::transcript;
use crate::tenants::TenantConfig;
use crate::whatsapp::{Button, MAX_BODY_CHARS, OutboundItem};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Reply sent when the loop cannot produce an answer.
pub const FALLBACK_TEXT: &str = "I couldn't complete that — please try again";

/// Action id of the "Today's Offer" button attached to model replies.
pub const TODAYS_OFFER_ACTION: &str = "todays_offer";

const SKIPPED_TOOL_RESULT: &str = "Skipped: the time budget for this reply ran out.";

/// Why the loop ended without a model-written reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    IterationLimit,
    Budget,
    Provider(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopOutcome {
    pub iterations: usize,
    pub tools_used: Vec<String>,
    pub fallback: Option<FallbackReason>,
}

pub struct LlmOrchestrator {
    providers: Arc<dyn ProviderSource>,
    tools: Arc<ToolRegistry>,
    config: AgentConfig,
}

impl LlmOrchestrator {
    pub fn new(
        providers: Arc<dyn ProviderSource>,
        tools: Arc<ToolRegistry>,
        config: AgentConfig,
    ) -> Self {
        Self {
            providers,
            tools,
            config,
        }
    }

    /// Run the loop for the user turn already appended to `record`.
    ///
    /// Assistant and tool turns are appended to the record; outbound messages
    /// emitted by tools and the final reply are appended to `plan`.
    pub async fn run(
        &self,
        tenant: &Arc<TenantConfig>,
        record: &mut ConversationRecord,
        plan: &mut OutboundPlan,
        products: &[Product],
    ) -> LoopOutcome {
        let deadline = Instant::now() + self.config.loop_budget();
        let mut outcome = LoopOutcome {
            iterations: 0,
            tools_used: Vec::new(),
            fallback: None,
        };

        let provider = match self.providers.provider_for(tenant) {
            Ok(p) => p,
            Err(e) => {
                warn!("tenant {}: no LLM provider: {}", tenant.tenant_id, e);
                outcome.fallback = Some(FallbackReason::Provider(e.to_string()));
                push_fallback(record, plan);
                return outcome;
            }
        };

        let system_prompt = build_system_prompt(tenant, products);
        let tool_defs = self.tools.get_tool_definitions();
        let ctx = ToolContext::new(Arc::clone(tenant), record.user.clone());

        for iteration in 1..=self.config.max_iterations {
            outcome.iterations = iteration;
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                outcome.fallback = Some(FallbackReason::Budget);
                break;
            }

            if let Some(report) = transcript::repair(&mut record.transcript) {
                record.note(format!(
                    "transcript repaired before model call: {} turns dropped at {}",
                    report.dropped, report.truncated_at
                ));
            }

            let request = ChatRequest {
                messages: build_messages(&system_prompt, &record.transcript),
                tools: (!tool_defs.is_empty()).then(|| tool_defs.clone()),
                model: Some(tenant.llm.model.as_str()),
                max_tokens: self.config.max_tokens,
                temperature: tenant.llm.temperature,
                tool_choice: None,
            };
            let call_timeout = self.config.llm_timeout().min(remaining);
            debug!(
                "tenant {}: model call {}/{} (timeout {:?})",
                tenant.tenant_id, iteration, self.config.max_iterations, call_timeout
            );

            let response: LLMResponse = match tokio::time::timeout(
                call_timeout,
                provider.chat_with_retry(request, Some(RetryConfig::default())),
            )
            .await
            {
                Ok(Ok(r)) => r,
                Ok(Err(e)) => {
                    warn!("tenant {}: model call failed: {}", tenant.tenant_id, e);
                    outcome.fallback = Some(FallbackReason::Provider(e.to_string()));
                    break;
                }
                Err(_) => {
                    warn!(
                        "tenant {}: model call timed out after {:?}",
                        tenant.tenant_id, call_timeout
                    );
                    outcome.fallback = Some(if Instant::now() >= deadline {
                        FallbackReason::Budget
                    } else {
                        FallbackReason::Provider("model call timed out".to_string())
                    });
                    break;
                }
            };

            if response.has_tool_calls() {
                let calls = assign_call_ids(response.tool_calls);
                outcome
                    .tools_used
                    .extend(calls.iter().map(|c| c.name.clone()));
                record.push(Turn::assistant_calls(
                    response.content.filter(|c| !c.trim().is_empty()),
                    calls.clone(),
                ));
                self.run_tools(&calls, &ctx, record, deadline).await;
                plan.extend(ctx.outbox.drain());
                continue;
            }

            match response.content.filter(|c| !c.trim().is_empty()) {
                Some(reply) => {
                    record.push(Turn::assistant_text(reply.clone()));
                    push_reply(tenant, &record.user, &reply, plan);
                    info!(
                        "tenant {}: replied after {} model call(s), tools: {:?}",
                        tenant.tenant_id, iteration, outcome.tools_used
                    );
                    return outcome;
                }
                None => warn!(
                    "tenant {}: empty model response on iteration {}",
                    tenant.tenant_id, iteration
                ),
            }
        }

        if outcome.fallback.is_none() {
            outcome.fallback = Some(FallbackReason::IterationLimit);
        }
        warn!(
            "tenant {}: tool loop ended without a reply ({:?})",
            tenant.tenant_id, outcome.fallback
        );
        push_fallback(record, plan);
        outcome
    }

    /// Execute calls in order so emitted messages keep the model's ordering.
    async fn run_tools(
        &self,
        calls: &[ToolCallRequest],
        ctx: &ToolContext,
        record: &mut ConversationRecord,
        deadline: Instant,
    ) {
        for call in calls {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let result = if remaining.is_zero() {
                ToolResult::error(SKIPPED_TOOL_RESULT)
            } else {
                tokio::time::timeout(
                    remaining,
                    self.tools.execute(&call.name, call.arguments.clone(), ctx),
                )
                .await
                .unwrap_or_else(|_| ToolResult::error(SKIPPED_TOOL_RESULT))
            };
            record.push(Turn::tool(&call.id, &call.name, result.content));
        }
    }
}

/// Give every call a unique non-empty id; providers occasionally omit or
/// repeat them and the transcript pairing depends on them.
fn assign_call_ids(calls: Vec<ToolCallRequest>) -> Vec<ToolCallRequest> {
    let mut seen = HashSet::new();
    calls
        .into_iter()
        .map(|mut call| {
            if call.id.trim().is_empty() || !seen.insert(call.id.clone()) {
                call.id = format!("call_{}", uuid::Uuid::new_v4().simple());
                seen.insert(call.id.clone());
            }
            call
        })
        .collect()
}

/// Translate the transcript into chat messages. System notes stay internal.
pub fn build_messages(system_prompt: &str, turns: &[Turn]) -> Vec<Message> {
    let mut messages = Vec::with_capacity(turns.len() + 1);
    messages.push(Message::system(system_prompt));
    for turn in turns {
        match turn {
            Turn::User { text, .. } => messages.push(Message::user(text.as_str())),
            Turn::Assistant { text, tool_calls } => messages.push(Message::assistant(
                text.clone().unwrap_or_default(),
                (!tool_calls.is_empty()).then(|| tool_calls.clone()),
            )),
            Turn::Tool {
                tool_call_id,
                result_text,
                ..
            } => messages.push(Message::tool_result(tool_call_id, result_text.as_str())),
            Turn::SystemNote { .. } => {}
        }
    }
    messages
}

fn push_reply(tenant: &TenantConfig, user: &str, reply: &str, plan: &mut OutboundPlan) {
    if !tenant.store.todays_offer {
        plan.push_text(user, reply);
        return;
    }
    let offer = Button::new(TODAYS_OFFER_ACTION, "Today's Offer");
    if reply.chars().count() <= MAX_BODY_CHARS {
        plan.push(
            user,
            OutboundItem::Buttons {
                header: None,
                body: reply.to_string(),
                footer: None,
                buttons: vec![offer],
            },
        );
    } else {
        plan.push_text(user, reply);
        plan.push(
            user,
            OutboundItem::Buttons {
                header: None,
                body: "Don't miss today's special offer!".to_string(),
                footer: None,
                buttons: vec![offer],
            },
        );
    }
}

fn push_fallback(record: &mut ConversationRecord, plan: &mut OutboundPlan) {
    record.push(Turn::assistant_text(FALLBACK_TEXT));
    plan.push_text(record.user.clone(), FALLBACK_TEXT);
}
