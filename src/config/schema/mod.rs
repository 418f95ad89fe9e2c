use crate::tenants::TenantConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Upper bound for session TTLs and the dedup window, in hours (one year).
pub const MAX_RETENTION_HOURS: u64 = 24 * 365;

/// Generates a `Debug` impl that redacts secret fields.
///
/// Field specifiers:
/// - `field_name`: printed normally via `&self.field_name`
/// - `redact(field_name)`: `String` field, shows `[empty]` or `[REDACTED]`
/// - `redact_option(field_name)`: `Option<String>` field, shows `None` or `Some("[REDACTED]")`
macro_rules! redact_debug {
    (@field $builder:ident, $self:ident, redact($field:ident)) => {
        $builder.field(
            stringify!($field),
            &if $self.$field.is_empty() {
                "[empty]"
            } else {
                "[REDACTED]"
            },
        );
    };
    (@field $builder:ident, $self:ident, redact_option($field:ident)) => {
        $builder.field(
            stringify!($field),
            &$self.$field.as_ref().map(|_| "[REDACTED]"),
        );
    };
    (@field $builder:ident, $self:ident, $field:ident) => {
        $builder.field(stringify!($field), &$self.$field);
    };

    (@fields $builder:ident, $self:ident,) => {};
    (@fields $builder:ident, $self:ident, redact($field:ident), $($rest:tt)*) => {
        redact_debug!(@field $builder, $self, redact($field));
        redact_debug!(@fields $builder, $self, $($rest)*);
    };
    (@fields $builder:ident, $self:ident, redact_option($field:ident), $($rest:tt)*) => {
        redact_debug!(@field $builder, $self, redact_option($field));
        redact_debug!(@fields $builder, $self, $($rest)*);
    };
    (@fields $builder:ident, $self:ident, $field:ident, $($rest:tt)*) => {
        redact_debug!(@field $builder, $self, $field);
        redact_debug!(@fields $builder, $self, $($rest)*);
    };

    ($struct_name:ident, $($fields:tt)*) => {
        impl std::fmt::Debug for $struct_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                let mut builder = f.debug_struct(stringify!($struct_name));
                redact_debug!(@fields builder, self, $($fields)*);
                builder.finish()
            }
        }
    };
}

pub(crate) use redact_debug;

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_body_bytes() -> usize {
    1_048_576
}

#[derive(Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Fallback verify token accepted by the GET handshake in addition to
    /// every tenant's own token.
    #[serde(default, rename = "verifyToken")]
    pub verify_token: String,
    /// Debug bypass: accept POSTs without a signature header. Never enable in
    /// production; a present-but-wrong signature is still rejected.
    #[serde(default, rename = "allowUnsigned")]
    pub allow_unsigned: bool,
    #[serde(default, rename = "testWebhook")]
    pub test_webhook: TestWebhookConfig,
    /// Shared secret expected in `X-Callback-Token` on workflow status callbacks.
    /// Empty disables the check.
    #[serde(default, rename = "callbackToken")]
    pub callback_token: String,
    #[serde(default = "default_max_body_bytes", rename = "maxBodyBytes")]
    pub max_body_bytes: usize,
}

redact_debug!(
    GatewayConfig,
    host,
    port,
    redact(verify_token),
    allow_unsigned,
    test_webhook,
    redact(callback_token),
    max_body_bytes,
);

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            verify_token: String::new(),
            allow_unsigned: false,
            test_webhook: TestWebhookConfig::default(),
            callback_token: String::new(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

/// Administrative credential-rotation endpoint (`POST /test-webhook`).
#[derive(Clone, Serialize, Deserialize, Default)]
pub struct TestWebhookConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, rename = "adminToken")]
    pub admin_token: String,
}

redact_debug!(TestWebhookConfig, enabled, redact(admin_token),);

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

fn default_session_ttl_hours() -> u64 {
    1
}

fn default_max_turns() -> usize {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_session_ttl_hours", rename = "ttlHours")]
    pub ttl_hours: u64,
    #[serde(default = "default_max_turns", rename = "maxUserTurns")]
    pub max_user_turns: usize,
    #[serde(default = "default_max_turns", rename = "maxAssistantTurns")]
    pub max_assistant_turns: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_hours: default_session_ttl_hours(),
            max_user_turns: default_max_turns(),
            max_assistant_turns: default_max_turns(),
        }
    }
}

// ---------------------------------------------------------------------------
// Idempotency
// ---------------------------------------------------------------------------

fn default_dedup_window_hours() -> u64 {
    24
}

fn default_dedup_capacity() -> usize {
    10_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupConfig {
    #[serde(default = "default_dedup_window_hours", rename = "windowHours")]
    pub window_hours: u64,
    #[serde(default = "default_dedup_capacity", rename = "cacheCapacity")]
    pub cache_capacity: usize,
    /// Record processed message ids in the database as well as in memory.
    /// Required when more than one replica serves the webhook.
    #[serde(default = "default_true")]
    pub durable: bool,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            window_hours: default_dedup_window_hours(),
            cache_capacity: default_dedup_capacity(),
            durable: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Agent (LLM orchestrator)
// ---------------------------------------------------------------------------

fn default_max_iterations() -> usize {
    4
}

fn default_loop_budget_secs() -> u64 {
    60
}

fn default_llm_timeout_secs() -> u64 {
    30
}

fn default_tool_timeout_secs() -> u64 {
    15
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_max_tool_result_chars() -> usize {
    4000
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_max_iterations", rename = "maxIterations")]
    pub max_iterations: usize,
    #[serde(default = "default_loop_budget_secs", rename = "loopBudgetSecs")]
    pub loop_budget_secs: u64,
    #[serde(default = "default_llm_timeout_secs", rename = "llmTimeoutSecs")]
    pub llm_timeout_secs: u64,
    #[serde(default = "default_tool_timeout_secs", rename = "toolTimeoutSecs")]
    pub tool_timeout_secs: u64,
    #[serde(default = "default_max_tokens", rename = "maxTokens")]
    pub max_tokens: u32,
    #[serde(default = "default_max_tool_result_chars", rename = "maxToolResultChars")]
    pub max_tool_result_chars: usize,
    #[serde(default = "default_openai_base_url", rename = "openaiBaseUrl")]
    pub openai_base_url: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            loop_budget_secs: default_loop_budget_secs(),
            llm_timeout_secs: default_llm_timeout_secs(),
            tool_timeout_secs: default_tool_timeout_secs(),
            max_tokens: default_max_tokens(),
            max_tool_result_chars: default_max_tool_result_chars(),
            openai_base_url: default_openai_base_url(),
        }
    }
}

impl AgentConfig {
    pub fn loop_budget(&self) -> Duration {
        Duration::from_secs(self.loop_budget_secs)
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs)
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// Transport (WhatsApp Cloud API)
// ---------------------------------------------------------------------------

fn default_graph_base_url() -> String {
    "https://graph.facebook.com".to_string()
}

fn default_api_version() -> String {
    "v21.0".to_string()
}

fn default_send_timeout_secs() -> u64 {
    10
}

fn default_pacing_ms() -> u64 {
    400
}

fn default_retry_delay_ms() -> u64 {
    500
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default = "default_graph_base_url", rename = "baseUrl")]
    pub base_url: String,
    #[serde(default = "default_api_version", rename = "apiVersion")]
    pub api_version: String,
    #[serde(default = "default_send_timeout_secs", rename = "sendTimeoutSecs")]
    pub send_timeout_secs: u64,
    /// Delay between consecutive messages to the same recipient in one turn.
    #[serde(default = "default_pacing_ms", rename = "pacingMs")]
    pub pacing_ms: u64,
    #[serde(default = "default_retry_delay_ms", rename = "retryDelayMs")]
    pub retry_delay_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_url: default_graph_base_url(),
            api_version: default_api_version(),
            send_timeout_secs: default_send_timeout_secs(),
            pacing_ms: default_pacing_ms(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

// ---------------------------------------------------------------------------
// External services
// ---------------------------------------------------------------------------

fn default_pos_base_url() -> String {
    "http://127.0.0.1:3000/api".to_string()
}

fn default_pos_timeout_secs() -> u64 {
    15
}

fn default_places_base_url() -> String {
    "https://maps.googleapis.com/maps/api/place".to_string()
}

fn default_region() -> String {
    "sg".to_string()
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ServicesConfig {
    #[serde(default = "default_pos_base_url", rename = "posBaseUrl")]
    pub pos_base_url: String,
    #[serde(default, rename = "posApiKey")]
    pub pos_api_key: String,
    #[serde(default = "default_pos_timeout_secs", rename = "posTimeoutSecs")]
    pub pos_timeout_secs: u64,
    /// Public base URL of this service, advertised to the workflow runner
    /// for status callbacks.
    #[serde(default, rename = "callbackBaseUrl")]
    pub callback_base_url: String,
    /// Default workflow webhook; tenants may override.
    #[serde(default, rename = "workflowWebhookUrl")]
    pub workflow_webhook_url: String,
    #[serde(default = "default_places_base_url", rename = "placesBaseUrl")]
    pub places_base_url: String,
    #[serde(default = "default_region", rename = "defaultRegion")]
    pub default_region: String,
}

redact_debug!(
    ServicesConfig,
    pos_base_url,
    redact(pos_api_key),
    pos_timeout_secs,
    callback_base_url,
    workflow_webhook_url,
    places_base_url,
    default_region,
);

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            pos_base_url: default_pos_base_url(),
            pos_api_key: String::new(),
            pos_timeout_secs: default_pos_timeout_secs(),
            callback_base_url: String::new(),
            workflow_webhook_url: String::new(),
            places_base_url: default_places_base_url(),
            default_region: default_region(),
        }
    }
}

// ---------------------------------------------------------------------------
// Storage and tenant cache
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    /// SQLite database file. Defaults to `~/.wahub/wahub.db`.
    #[serde(default, rename = "dbPath")]
    pub db_path: Option<PathBuf>,
}

impl StorageConfig {
    pub fn resolve_db_path(&self) -> anyhow::Result<PathBuf> {
        match &self.db_path {
            Some(p) => Ok(p.clone()),
            None => Ok(crate::utils::get_wahub_home()?.join("wahub.db")),
        }
    }
}

fn default_tenant_cache_ttl_secs() -> u64 {
    300
}

fn default_tenant_cache_capacity() -> u64 {
    1000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantCacheConfig {
    #[serde(default = "default_tenant_cache_ttl_secs", rename = "ttlSecs")]
    pub ttl_secs: u64,
    #[serde(default = "default_tenant_cache_capacity")]
    pub capacity: u64,
}

impl Default for TenantCacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_tenant_cache_ttl_secs(),
            capacity: default_tenant_cache_capacity(),
        }
    }
}

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub dedup: DedupConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub services: ServicesConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default, rename = "tenantCache")]
    pub tenant_cache: TenantCacheConfig,
    /// Tenants imported into the tenant table at startup.
    #[serde(default)]
    pub tenants: Vec<TenantConfig>,
}

impl Config {
    pub fn validate(&self) -> Result<(), crate::errors::WahubError> {
        self.validate_gateway()?;
        self.validate_session()?;
        self.validate_dedup()?;
        self.validate_agent()?;
        self.validate_transport()?;
        self.validate_tenants()?;
        Ok(())
    }

    fn validate_gateway(&self) -> Result<(), crate::errors::WahubError> {
        use crate::errors::WahubError;
        let g = &self.gateway;

        if g.port == 0 {
            return Err(WahubError::Config("gateway.port must be > 0".into()));
        }
        if g.max_body_bytes == 0 {
            return Err(WahubError::Config(
                "gateway.maxBodyBytes must be > 0".into(),
            ));
        }
        if g.test_webhook.enabled && g.test_webhook.admin_token.is_empty() {
            return Err(WahubError::Config(
                "gateway.testWebhook.adminToken is required when the test webhook is enabled"
                    .into(),
            ));
        }
        Ok(())
    }

    fn validate_session(&self) -> Result<(), crate::errors::WahubError> {
        use crate::errors::WahubError;
        let s = &self.session;

        if s.ttl_hours == 0 || s.ttl_hours > MAX_RETENTION_HOURS {
            return Err(WahubError::Config(format!(
                "session.ttlHours must be between 1 and {}",
                MAX_RETENTION_HOURS
            )));
        }
        if s.max_user_turns == 0 || s.max_assistant_turns == 0 {
            return Err(WahubError::Config(
                "session.maxUserTurns and session.maxAssistantTurns must be > 0".into(),
            ));
        }
        Ok(())
    }

    fn validate_dedup(&self) -> Result<(), crate::errors::WahubError> {
        use crate::errors::WahubError;
        let d = &self.dedup;

        if d.window_hours < 24 || d.window_hours > MAX_RETENTION_HOURS {
            return Err(WahubError::Config(format!(
                "dedup.windowHours must be between 24 and {}",
                MAX_RETENTION_HOURS
            )));
        }
        if d.cache_capacity == 0 {
            return Err(WahubError::Config(
                "dedup.cacheCapacity must be > 0".into(),
            ));
        }
        Ok(())
    }

    fn validate_agent(&self) -> Result<(), crate::errors::WahubError> {
        use crate::errors::WahubError;
        let a = &self.agent;

        if a.max_iterations == 0 {
            return Err(WahubError::Config(
                "agent.maxIterations must be > 0".into(),
            ));
        }
        if a.max_iterations > 32 {
            return Err(WahubError::Config(
                "agent.maxIterations is unreasonably large (> 32)".into(),
            ));
        }
        if a.llm_timeout_secs == 0 || a.tool_timeout_secs == 0 {
            return Err(WahubError::Config(
                "agent.llmTimeoutSecs and agent.toolTimeoutSecs must be > 0".into(),
            ));
        }
        if a.loop_budget_secs < a.llm_timeout_secs {
            return Err(WahubError::Config(
                "agent.loopBudgetSecs must be >= agent.llmTimeoutSecs".into(),
            ));
        }
        if a.max_tokens == 0 {
            return Err(WahubError::Config("agent.maxTokens must be > 0".into()));
        }
        Ok(())
    }

    fn validate_transport(&self) -> Result<(), crate::errors::WahubError> {
        use crate::errors::WahubError;
        let t = &self.transport;

        if t.send_timeout_secs == 0 {
            return Err(WahubError::Config(
                "transport.sendTimeoutSecs must be > 0".into(),
            ));
        }
        if t.api_version.is_empty() {
            return Err(WahubError::Config(
                "transport.apiVersion must not be empty".into(),
            ));
        }
        Ok(())
    }

    fn validate_tenants(&self) -> Result<(), crate::errors::WahubError> {
        use crate::errors::WahubError;
        let mut seen_phone_ids = std::collections::HashSet::new();

        for tenant in &self.tenants {
            tenant.validate()?;
            if !seen_phone_ids.insert(tenant.whatsapp.phone_number_id.as_str()) {
                return Err(WahubError::Config(format!(
                    "tenants: phone number id {} is mapped to more than one tenant",
                    tenant.whatsapp.phone_number_id
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
