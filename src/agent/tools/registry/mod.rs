use crate::agent::tools::base::{Tool, ToolContext, ToolMiddleware, ToolResult};
use crate::agent::truncation::truncate_tool_result;
use crate::providers::base::ToolDefinition;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_MAX_RESULT_CHARS: usize = 4000;

pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    middleware: Vec<Arc<dyn ToolMiddleware>>,
    default_timeout: Duration,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_TOOL_TIMEOUT, DEFAULT_MAX_RESULT_CHARS)
    }

    pub fn with_limits(default_timeout: Duration, max_result_chars: usize) -> Self {
        Self {
            tools: HashMap::new(),
            middleware: vec![
                Arc::new(TruncationMiddleware::new(max_result_chars)),
                Arc::new(LoggingMiddleware),
            ],
            default_timeout,
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if name.is_empty() || name.len() > 64 || name.chars().any(char::is_control) {
            warn!("tool registry: rejecting tool with invalid name '{}'", name);
            return;
        }
        if self.tools.contains_key(&name) {
            warn!("tool registry: overwriting duplicate tool '{}'", name);
        }
        self.tools.insert(name, tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Returns a sorted list of all registered tool names.
    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn get_tool_definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<_> = self
            .tools
            .values()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters(),
            })
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Execute a tool through the middleware pipeline. Never fails: unknown
    /// tools, tool errors, timeouts and panics all come back as an error
    /// result the model can read.
    pub async fn execute(&self, name: &str, params: Value, ctx: &ToolContext) -> ToolResult {
        let Some(tool) = self.tools.get(name).cloned() else {
            warn!("model requested unknown tool '{}'", name);
            return ToolResult::error(format!(
                "Error: unknown tool '{}'. Available tools: {}",
                name,
                self.tool_names().join(", ")
            ));
        };

        for mw in &self.middleware {
            if let Some(result) = mw.before_execute(name, &params, ctx).await {
                return result;
            }
        }

        let mut result = self.execute_with_guards(name, tool, params.clone(), ctx).await;

        for mw in &self.middleware {
            mw.after_execute(name, &params, ctx, &mut result).await;
        }
        result
    }

    /// Run the tool on its own task so a panic is contained and the timeout
    /// is enforced.
    async fn execute_with_guards(
        &self,
        name: &str,
        tool: Arc<dyn Tool>,
        params: Value,
        ctx: &ToolContext,
    ) -> ToolResult {
        let tool_name = name.to_string();
        let ctx = ctx.clone();
        let timeout = tool.execution_timeout().unwrap_or(self.default_timeout);

        let handle = tokio::task::spawn(async move {
            tokio::time::timeout(timeout, tool.execute(params, &ctx)).await
        });

        match handle.await {
            Ok(Ok(Ok(result))) => result,
            Ok(Ok(Err(e))) => ToolResult::error(format!("Error: {}", e)),
            Ok(Err(_)) => {
                warn!("Tool '{}' timed out after {:?}", tool_name, timeout);
                ToolResult::error(format!(
                    "Error: tool '{}' timed out after {}s",
                    tool_name,
                    timeout.as_secs()
                ))
            }
            Err(join_err) => {
                let msg = if join_err.is_panic() {
                    let payload = join_err.into_panic();
                    payload
                        .downcast_ref::<String>()
                        .cloned()
                        .or_else(|| payload.downcast_ref::<&str>().map(|s| (*s).to_string()))
                        .unwrap_or_else(|| "unknown cause".to_string())
                } else {
                    "cancelled".to_string()
                };
                error!("Tool '{}' crashed: {}", tool_name, msg);
                ToolResult::error(format!("Error: tool '{}' crashed: {}", tool_name, msg))
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Truncation middleware: clips tool results before they enter the transcript.
pub struct TruncationMiddleware {
    max_chars: usize,
}

impl TruncationMiddleware {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }
}

#[async_trait::async_trait]
impl ToolMiddleware for TruncationMiddleware {
    async fn after_execute(
        &self,
        _name: &str,
        _params: &Value,
        _ctx: &ToolContext,
        result: &mut ToolResult,
    ) {
        result.content = truncate_tool_result(&result.content, self.max_chars);
    }
}

/// Logging middleware.
pub struct LoggingMiddleware;

#[async_trait::async_trait]
impl ToolMiddleware for LoggingMiddleware {
    async fn before_execute(
        &self,
        name: &str,
        params: &Value,
        ctx: &ToolContext,
    ) -> Option<ToolResult> {
        debug!(
            "Executing tool: {} (tenant={}) with arguments: {}",
            name, ctx.tenant.tenant_id, params
        );
        None
    }

    async fn after_execute(
        &self,
        name: &str,
        _params: &Value,
        ctx: &ToolContext,
        result: &mut ToolResult,
    ) {
        if result.is_error {
            warn!(
                "Tool '{}' returned error for tenant {}: {}",
                name, ctx.tenant.tenant_id, result.content
            );
        } else {
            info!("Tool '{}' completed ({} chars)", name, result.content.len());
        }
    }
}
