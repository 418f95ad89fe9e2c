pub mod base;
pub mod errors;
pub mod openai;

use crate::config::AgentConfig;
use crate::errors::WahubError;
use crate::tenants::TenantConfig;
use base::LLMProvider;
use moka::sync::Cache;
use openai::OpenAIProvider;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

/// Connect timeout for LLM provider HTTP clients (seconds).
pub(crate) const PROVIDER_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Build a `reqwest::Client` with the provider connect timeout and the given
/// overall request timeout.
pub(crate) fn provider_http_client(request_timeout: Duration) -> Client {
    Client::builder()
        .connect_timeout(Duration::from_secs(PROVIDER_CONNECT_TIMEOUT_SECS))
        .timeout(request_timeout)
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Hands out the LLM provider to use for a tenant.
pub trait ProviderSource: Send + Sync {
    fn provider_for(&self, tenant: &TenantConfig) -> Result<Arc<dyn LLMProvider>, WahubError>;
}

/// Every tenant shares one provider. Used by tests and local tooling.
impl ProviderSource for Arc<dyn LLMProvider> {
    fn provider_for(&self, _tenant: &TenantConfig) -> Result<Arc<dyn LLMProvider>, WahubError> {
        Ok(Arc::clone(self))
    }
}

/// Builds one OpenAI-compatible provider per tenant and keeps it cached so the
/// underlying HTTP connection pool is reused across turns.
pub struct ProviderFactory {
    cache: Cache<String, Arc<dyn LLMProvider>>,
    default_base_url: String,
    request_timeout: Duration,
}

impl ProviderFactory {
    pub fn new(config: &AgentConfig) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(1_000)
                .time_to_idle(Duration::from_secs(3600))
                .build(),
            default_base_url: config.openai_base_url.clone(),
            request_timeout: Duration::from_secs(config.llm_timeout_secs),
        }
    }

    /// Drop the cached provider after a credential change.
    pub fn invalidate(&self, tenant_id: &str) {
        self.cache.invalidate(tenant_id);
    }
}

impl ProviderSource for ProviderFactory {
    fn provider_for(&self, tenant: &TenantConfig) -> Result<Arc<dyn LLMProvider>, WahubError> {
        if tenant.llm.api_key.is_empty() {
            return Err(WahubError::TenantNotConfigured(format!(
                "{}: llm.apiKey is empty",
                tenant.tenant_id
            )));
        }
        let base_url = tenant
            .llm
            .base_url
            .clone()
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| self.default_base_url.clone());
        let timeout = self.request_timeout;
        Ok(self.cache.get_with(tenant.tenant_id.clone(), || {
            Arc::new(OpenAIProvider::new(
                tenant.llm.api_key.clone(),
                tenant.llm.model.clone(),
                base_url,
                timeout,
            )) as Arc<dyn LLMProvider>
        }))
    }
}
