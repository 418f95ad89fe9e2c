use crate::errors::WahubError;
use crate::tenants::{TenantConfig, TenantStore};
use moka::sync::Cache;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};

/// Tenant resolver and read-through configuration cache.
///
/// Maps a business phone number id to a tenant and serves `TenantConfig`
/// snapshots. This is the only component that reads tenant secrets from the
/// durable store.
pub struct TenantDirectory {
    store: Arc<dyn TenantStore>,
    configs: Cache<String, Arc<TenantConfig>>,
    phones: Cache<String, String>,
}

/// Partial credential update accepted by the rotation endpoint.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct CredentialRotation {
    #[serde(rename = "tenantId")]
    pub tenant_id: String,
    #[serde(default, rename = "accessToken")]
    pub access_token: Option<String>,
    #[serde(default, rename = "verifyToken")]
    pub verify_token: Option<String>,
    #[serde(default, rename = "appSecret")]
    pub app_secret: Option<String>,
    #[serde(default, rename = "phoneNumberId")]
    pub phone_number_id: Option<String>,
}

impl TenantDirectory {
    pub fn new(store: Arc<dyn TenantStore>, ttl: Duration, capacity: u64) -> Self {
        Self {
            store,
            configs: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
            phones: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Map a business phone number id to its tenant id.
    pub async fn resolve_tenant_id(&self, phone_number_id: &str) -> Result<String, WahubError> {
        if let Some(tenant_id) = self.phones.get(phone_number_id) {
            return Ok(tenant_id);
        }
        let tenant_id = self
            .store
            .tenant_id_for_phone(phone_number_id)
            .await?
            .ok_or_else(|| WahubError::UnknownTenant(phone_number_id.to_string()))?;
        self.phones
            .insert(phone_number_id.to_string(), tenant_id.clone());
        Ok(tenant_id)
    }

    /// Configuration snapshot for a tenant, loaded on first use.
    pub async fn config(&self, tenant_id: &str) -> Result<Arc<TenantConfig>, WahubError> {
        if let Some(config) = self.configs.get(tenant_id) {
            return Ok(config);
        }
        debug!("tenant cache miss for {}", tenant_id);
        let config = self
            .store
            .load(tenant_id)
            .await?
            .ok_or_else(|| WahubError::TenantNotConfigured(tenant_id.to_string()))?;
        let config = Arc::new(config);
        self.configs.insert(tenant_id.to_string(), config.clone());
        Ok(config)
    }

    pub async fn resolve(&self, phone_number_id: &str) -> Result<Arc<TenantConfig>, WahubError> {
        let tenant_id = self.resolve_tenant_id(phone_number_id).await?;
        self.config(&tenant_id).await
    }

    /// Whether any configured tenant uses `token` as its verify token.
    pub async fn verify_token_matches(&self, token: &str) -> Result<bool, WahubError> {
        if token.is_empty() {
            return Ok(false);
        }
        let tenants = self.store.list().await?;
        Ok(tenants.iter().any(|t| {
            !t.whatsapp.verify_token.is_empty()
                && bool::from(t.whatsapp.verify_token.as_bytes().ct_eq(token.as_bytes()))
        }))
    }

    pub fn invalidate(&self, tenant_id: &str) {
        self.configs.invalidate(tenant_id);
        self.phones.invalidate_all();
    }

    pub fn invalidate_all(&self) {
        self.configs.invalidate_all();
        self.phones.invalidate_all();
    }

    /// Drop the cached snapshot and reload from the store.
    pub async fn refresh(&self, tenant_id: &str) -> Result<Arc<TenantConfig>, WahubError> {
        self.invalidate(tenant_id);
        self.config(tenant_id).await
    }

    /// Upsert tenants (e.g. the config file's seed list) and drop cached copies.
    pub async fn import(&self, tenants: &[TenantConfig]) -> Result<usize, WahubError> {
        for tenant in tenants {
            tenant.validate()?;
            self.store.upsert(tenant).await?;
        }
        self.invalidate_all();
        if !tenants.is_empty() {
            info!("imported {} tenant(s)", tenants.len());
        }
        Ok(tenants.len())
    }

    pub async fn list(&self) -> Result<Vec<TenantConfig>, WahubError> {
        Ok(self.store.list().await?)
    }

    /// Apply a credential rotation and return the refreshed snapshot.
    pub async fn rotate_credentials(
        &self,
        rotation: &CredentialRotation,
    ) -> Result<Arc<TenantConfig>, WahubError> {
        let mut config = self
            .store
            .load(&rotation.tenant_id)
            .await?
            .ok_or_else(|| WahubError::TenantNotConfigured(rotation.tenant_id.clone()))?;

        let creds = &mut config.whatsapp;
        if let Some(v) = &rotation.access_token {
            creds.access_token.clone_from(v);
        }
        if let Some(v) = &rotation.verify_token {
            creds.verify_token.clone_from(v);
        }
        if let Some(v) = &rotation.app_secret {
            creds.app_secret.clone_from(v);
        }
        if let Some(v) = &rotation.phone_number_id {
            creds.phone_number_id.clone_from(v);
        }
        config.validate()?;

        self.store.upsert(&config).await?;
        warn!("rotated WhatsApp credentials for tenant {}", config.tenant_id);
        self.refresh(&config.tenant_id).await
    }
}
