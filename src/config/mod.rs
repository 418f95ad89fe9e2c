pub mod loader;
pub mod overrides;
pub mod schema;

pub use loader::{get_config_path, load_config, parse_config};
pub use overrides::apply_env_overrides;
pub use schema::{
    AgentConfig, Config, DedupConfig, GatewayConfig, ServicesConfig, SessionConfig,
    MAX_RETENTION_HOURS, StorageConfig, TenantCacheConfig, TestWebhookConfig, TransportConfig,
};
