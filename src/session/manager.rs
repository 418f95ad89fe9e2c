use crate::config::{MAX_RETENTION_HOURS, SessionConfig};
use crate::session::record::{ConversationRecord, expiry_after, session_key};
use crate::session::store::{CommitOutcome, SessionStore};
use crate::session::transcript::bound_tail;
use crate::tenants::TenantConfig;
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info};

/// Lifetime and transcript bounds applied to one tenant's sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicy {
    pub ttl: Duration,
    pub max_user_turns: usize,
    pub max_assistant_turns: usize,
}

impl SessionPolicy {
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            ttl: ttl_from_hours(config.ttl_hours),
            max_user_turns: config.max_user_turns,
            max_assistant_turns: config.max_assistant_turns,
        }
    }

    /// Apply a tenant's session overrides on top of these defaults.
    pub fn for_tenant(self, tenant: &TenantConfig) -> Self {
        let mut policy = self;
        if let Some(hours) = tenant.session.ttl_hours.filter(|h| *h > 0) {
            policy.ttl = ttl_from_hours(hours);
        }
        if let Some(bound) = tenant.session.transcript_bound {
            policy.max_user_turns = bound;
            policy.max_assistant_turns = bound;
        }
        policy
    }
}

/// Hours as a TTL, clamped to `1..=MAX_RETENTION_HOURS` so expiry
/// arithmetic cannot overflow.
fn ttl_from_hours(hours: u64) -> Duration {
    let hours = hours.clamp(1, MAX_RETENTION_HOURS);
    Duration::hours(i64::try_from(hours).unwrap_or(24))
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self::from_config(&SessionConfig::default())
    }
}

/// Loads and commits conversation records with expiry and optimistic concurrency.
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    defaults: SessionPolicy,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, defaults: SessionPolicy) -> Self {
        Self { store, defaults }
    }

    pub fn policy_for(&self, tenant: &TenantConfig) -> SessionPolicy {
        self.defaults.for_tenant(tenant)
    }

    /// Return the user's live record, or a fresh one in the tenant's initial
    /// state if none exists or the stored one has expired.
    ///
    /// A fresh record that replaces an expired row keeps the row's version so
    /// the next commit overwrites it.
    pub async fn load(&self, tenant: &TenantConfig, user: &str) -> Result<ConversationRecord> {
        let key = session_key(&tenant.tenant_id, user);
        let policy = self.policy_for(tenant);
        match self.store.get(&key).await? {
            Some(record) if !record.is_expired(Utc::now()) => Ok(record),
            Some(stale) => {
                info!("session {} expired, starting fresh", key);
                let mut fresh =
                    ConversationRecord::fresh(&tenant.tenant_id, user, tenant.kind, policy.ttl);
                fresh.version = stale.version;
                Ok(fresh)
            }
            None => {
                debug!("no session for {}, starting fresh", key);
                Ok(ConversationRecord::fresh(
                    &tenant.tenant_id,
                    user,
                    tenant.kind,
                    policy.ttl,
                ))
            }
        }
    }

    /// Bound the transcript, stamp timestamps and commit conditionally on the
    /// version the record was loaded with. On success the record's version
    /// is advanced so it can be committed again.
    pub async fn commit(
        &self,
        tenant: &TenantConfig,
        record: &mut ConversationRecord,
    ) -> Result<CommitOutcome> {
        let policy = self.policy_for(tenant);
        bound_tail(
            &mut record.transcript,
            policy.max_user_turns,
            policy.max_assistant_turns,
        );

        let expected = record.version;
        let now = next_timestamp(Utc::now(), expected);
        record.updated_at = now;
        record.expires_at = expiry_after(now, policy.ttl);

        let outcome = self.store.compare_and_swap(record, expected).await?;
        if outcome == CommitOutcome::Committed {
            record.version = Some(now.timestamp_millis());
        } else {
            debug!("session {} commit conflict", record.session_key());
        }
        Ok(outcome)
    }

    pub async fn purge_expired(&self) -> Result<usize> {
        self.store.purge_expired(Utc::now()).await
    }
}

/// A commit timestamp strictly newer than the version being replaced, so two
/// commits within the same millisecond still produce distinct versions.
fn next_timestamp(now: DateTime<Utc>, previous: Option<i64>) -> DateTime<Utc> {
    match previous {
        Some(prev) if now.timestamp_millis() <= prev => {
            DateTime::from_timestamp_millis(prev + 1).unwrap_or(now)
        }
        _ => now,
    }
}
