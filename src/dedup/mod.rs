use crate::config::{DedupConfig, MAX_RETENTION_HOURS};
use crate::storage::Database;
use chrono::{DateTime, Duration, Utc};
use lru::LruCache;
use rusqlite::params;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// At-most-once admission of inbound messages per `(tenant, message id)`.
///
/// An in-process LRU is the fast path. When a durable table is configured it
/// is consulted on every LRU miss, so parallel replicas sharing the database
/// still admit a message only once within the window.
pub struct IdempotencyFilter {
    window: Duration,
    recent: Mutex<LruCache<(String, String), DateTime<Utc>>>,
    db: Option<Arc<Database>>,
}

impl IdempotencyFilter {
    pub fn new(config: &DedupConfig, db: Option<Arc<Database>>) -> Self {
        let capacity = NonZeroUsize::new(config.cache_capacity).unwrap_or(NonZeroUsize::MIN);
        let hours = i64::try_from(config.window_hours.clamp(24, MAX_RETENTION_HOURS)).unwrap_or(24);
        Self {
            window: Duration::hours(hours),
            recent: Mutex::new(LruCache::new(capacity)),
            db: if config.durable { db } else { None },
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Returns `true` if the message should be processed. Records the
    /// admission before returning, so a concurrent repeat sees it.
    pub async fn admit(&self, tenant_id: &str, message_id: &str) -> bool {
        self.admit_at(tenant_id, message_id, Utc::now()).await
    }

    pub(crate) async fn admit_at(&self, tenant_id: &str, message_id: &str, now: DateTime<Utc>) -> bool {
        if message_id.is_empty() {
            return true;
        }
        let key = (tenant_id.to_string(), message_id.to_string());
        let cutoff = now - self.window;

        let mut recent = self.recent.lock().await;
        if let Some(seen_at) = recent.get(&key)
            && *seen_at > cutoff
        {
            debug!("duplicate message {} for tenant {} (cache)", message_id, tenant_id);
            return false;
        }

        if let Some(db) = &self.db {
            match claim_durable(db, tenant_id, message_id, now, cutoff) {
                Ok(true) => {}
                Ok(false) => {
                    debug!("duplicate message {} for tenant {} (table)", message_id, tenant_id);
                    recent.put(key, now);
                    return false;
                }
                Err(e) => {
                    warn!(
                        "idempotency table unavailable, falling back to cache for {}: {}",
                        message_id, e
                    );
                }
            }
        }

        recent.put(key, now);
        true
    }

    /// Delete durable records older than the window. Returns rows removed.
    pub fn purge_expired(&self) -> anyhow::Result<usize> {
        let Some(db) = &self.db else {
            return Ok(0);
        };
        let cutoff = (Utc::now() - self.window).timestamp_millis();
        db.with_conn(|conn| {
            conn.execute(
                "DELETE FROM processed_messages WHERE processed_at_ms <= ?1",
                params![cutoff],
            )
        })
    }
}

/// Insert the record, or take over a row older than the window. One changed
/// row means this caller owns the message.
fn claim_durable(
    db: &Database,
    tenant_id: &str,
    message_id: &str,
    now: DateTime<Utc>,
    cutoff: DateTime<Utc>,
) -> anyhow::Result<bool> {
    let changed = db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO processed_messages (tenant_id, message_id, processed_at_ms)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(tenant_id, message_id) DO UPDATE
                SET processed_at_ms = excluded.processed_at_ms
                WHERE processed_messages.processed_at_ms <= ?4",
            params![
                tenant_id,
                message_id,
                now.timestamp_millis(),
                cutoff.timestamp_millis()
            ],
        )
    })?;
    Ok(changed == 1)
}
