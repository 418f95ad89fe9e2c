use crate::outbound::OutboundPlan;
use crate::tenants::TenantConfig;
use crate::whatsapp::OutboundItem;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub content: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }
}

impl std::fmt::Display for ToolResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.content)
    }
}

/// Messages a tool wants sent this turn. Shared between the loop and the
/// spawned tool task.
#[derive(Debug, Clone, Default)]
pub struct Outbox {
    plan: Arc<Mutex<OutboundPlan>>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, to: &str, item: OutboundItem) {
        self.plan
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(to, item);
    }

    pub fn push_text(&self, to: &str, body: impl Into<String>) {
        self.push(to, OutboundItem::text(body));
    }

    /// Move everything queued so far out of the outbox.
    pub fn drain(&self) -> OutboundPlan {
        std::mem::take(&mut *self.plan.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn len(&self) -> usize {
        self.plan.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Context passed to every tool execution: who is talking to which tenant,
/// and where emitted messages go.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub tenant: Arc<TenantConfig>,
    pub user: String,
    pub outbox: Outbox,
}

impl ToolContext {
    pub fn new(tenant: Arc<TenantConfig>, user: impl Into<String>) -> Self {
        Self {
            tenant,
            user: user.into(),
            outbox: Outbox::new(),
        }
    }

    /// Queue a message for the current user.
    pub fn reply(&self, item: OutboundItem) {
        self.outbox.push(&self.user, item);
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters(&self) -> Value; // JSON Schema

    /// Errors are turned into a `ToolResult::error` by the registry.
    async fn execute(&self, params: Value, ctx: &ToolContext) -> anyhow::Result<ToolResult>;

    /// Per-tool execution timeout. `None` uses the registry default.
    fn execution_timeout(&self) -> Option<Duration> {
        None
    }
}

/// Middleware that can intercept tool execution for cross-cutting concerns
/// like truncation and logging.
#[async_trait]
pub trait ToolMiddleware: Send + Sync {
    /// Called before tool execution. Return `Some` to short-circuit.
    async fn before_execute(
        &self,
        _name: &str,
        _params: &Value,
        _ctx: &ToolContext,
    ) -> Option<ToolResult> {
        None
    }

    /// Called after tool execution. Can modify the result (e.g., truncation).
    async fn after_execute(
        &self,
        _name: &str,
        _params: &Value,
        _ctx: &ToolContext,
        _result: &mut ToolResult,
    ) {
    }
}

/// Required string argument.
pub fn require_str<'a>(params: &'a Value, key: &str) -> anyhow::Result<&'a str> {
    params
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow::anyhow!("missing required argument '{}'", key))
}

/// Optional string argument; empty strings count as absent.
pub fn optional_str<'a>(params: &'a Value, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Optional integer argument. Models sometimes send numbers as strings.
pub fn optional_u64(params: &Value, key: &str) -> Option<u64> {
    match params.get(key)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Optional float argument, accepting numeric strings.
pub fn optional_f64(params: &Value, key: &str) -> Option<f64> {
    match params.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
