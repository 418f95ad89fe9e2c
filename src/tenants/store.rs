use crate::storage::Database;
use crate::tenants::TenantConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{OptionalExtension, params};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;

/// Durable source of tenant configuration. Only the tenant directory reads it.
#[async_trait]
pub trait TenantStore: Send + Sync {
    async fn tenant_id_for_phone(&self, phone_number_id: &str) -> Result<Option<String>>;

    async fn load(&self, tenant_id: &str) -> Result<Option<TenantConfig>>;

    async fn upsert(&self, config: &TenantConfig) -> Result<()>;

    async fn list(&self) -> Result<Vec<TenantConfig>>;
}

/// `tenant_tokens` table. A row whose `config` column is empty maps a phone
/// number to a tenant that has not been configured yet.
pub struct SqliteTenantStore {
    db: Arc<Database>,
}

impl SqliteTenantStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Reserve a phone number id for a tenant without configuring it.
    pub fn register_phone(&self, tenant_id: &str, phone_number_id: &str) -> Result<()> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO tenant_tokens (tenant_id, phone_number_id, config, updated_at)
                 VALUES (?1, ?2, '', ?3)
                 ON CONFLICT(tenant_id) DO UPDATE SET phone_number_id = excluded.phone_number_id",
                params![tenant_id, phone_number_id, Utc::now().to_rfc3339()],
            )
        })?;
        Ok(())
    }
}

#[async_trait]
impl TenantStore for SqliteTenantStore {
    async fn tenant_id_for_phone(&self, phone_number_id: &str) -> Result<Option<String>> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT tenant_id FROM tenant_tokens WHERE phone_number_id = ?1",
                params![phone_number_id],
                |row| row.get(0),
            )
            .optional()
        })
    }

    async fn load(&self, tenant_id: &str) -> Result<Option<TenantConfig>> {
        let raw: Option<String> = self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT config FROM tenant_tokens WHERE tenant_id = ?1",
                params![tenant_id],
                |row| row.get(0),
            )
            .optional()
        })?;
        match raw {
            Some(json) if !json.is_empty() => {
                let config = serde_json::from_str(&json)
                    .with_context(|| format!("corrupt tenant config for {}", tenant_id))?;
                Ok(Some(config))
            }
            _ => Ok(None),
        }
    }

    async fn upsert(&self, config: &TenantConfig) -> Result<()> {
        let json = serde_json::to_string(config)?;
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO tenant_tokens (tenant_id, phone_number_id, config, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(tenant_id) DO UPDATE SET
                    phone_number_id = excluded.phone_number_id,
                    config = excluded.config,
                    updated_at = excluded.updated_at",
                params![
                    config.tenant_id,
                    config.whatsapp.phone_number_id,
                    json,
                    Utc::now().to_rfc3339()
                ],
            )
        })?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<TenantConfig>> {
        let rows: Vec<(String, String)> = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT tenant_id, config FROM tenant_tokens WHERE config != '' ORDER BY tenant_id",
            )?;
            let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
            rows.collect()
        })?;
        let mut configs = Vec::with_capacity(rows.len());
        for (tenant_id, json) in rows {
            match serde_json::from_str(&json) {
                Ok(config) => configs.push(config),
                Err(e) => warn!("skipping corrupt tenant config {}: {}", tenant_id, e),
            }
        }
        Ok(configs)
    }
}

/// In-process tenant table for tests and single-replica development.
#[derive(Default)]
pub struct InMemoryTenantStore {
    phones: RwLock<HashMap<String, String>>,
    configs: RwLock<HashMap<String, TenantConfig>>,
}

impl InMemoryTenantStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register_phone(&self, tenant_id: &str, phone_number_id: &str) {
        self.phones
            .write()
            .await
            .insert(phone_number_id.to_string(), tenant_id.to_string());
    }
}

#[async_trait]
impl TenantStore for InMemoryTenantStore {
    async fn tenant_id_for_phone(&self, phone_number_id: &str) -> Result<Option<String>> {
        Ok(self.phones.read().await.get(phone_number_id).cloned())
    }

    async fn load(&self, tenant_id: &str) -> Result<Option<TenantConfig>> {
        Ok(self.configs.read().await.get(tenant_id).cloned())
    }

    async fn upsert(&self, config: &TenantConfig) -> Result<()> {
        let mut phones = self.phones.write().await;
        phones.retain(|_, tenant| tenant != &config.tenant_id);
        phones.insert(
            config.whatsapp.phone_number_id.clone(),
            config.tenant_id.clone(),
        );
        self.configs
            .write()
            .await
            .insert(config.tenant_id.clone(), config.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<TenantConfig>> {
        let mut configs: Vec<_> = self.configs.read().await.values().cloned().collect();
        configs.sort_by(|a, b| a.tenant_id.cmp(&b.tenant_id));
        Ok(configs)
    }
}
