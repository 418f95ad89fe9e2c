use crate::session::record::ConversationRecord;
use crate::session::store::{CommitOutcome, SessionStore};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lru::LruCache;
use std::num::NonZeroUsize;
use tokio::sync::Mutex;

const DEFAULT_CAPACITY: usize = 10_000;

/// Process-local session store. Used by tests and single-node deployments
/// that accept losing conversations on restart.
pub struct InMemorySessionStore {
    records: Mutex<LruCache<String, ConversationRecord>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            records: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, key: &str) -> Result<Option<ConversationRecord>> {
        let mut records = self.records.lock().await;
        Ok(records.get(key).map(|r| {
            let mut record = r.clone();
            record.version = Some(r.updated_at.timestamp_millis());
            record
        }))
    }

    async fn compare_and_swap(
        &self,
        record: &ConversationRecord,
        expected: Option<i64>,
    ) -> Result<CommitOutcome> {
        let key = record.session_key();
        let mut records = self.records.lock().await;
        let current = records.peek(&key).map(|r| r.updated_at.timestamp_millis());
        if current != expected {
            return Ok(CommitOutcome::Conflict);
        }
        let mut stored = record.clone();
        stored.version = None;
        records.put(key, stored);
        Ok(CommitOutcome::Committed)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut records = self.records.lock().await;
        let expired: Vec<String> = records
            .iter()
            .filter(|(_, r)| r.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            records.pop(key);
        }
        Ok(expired.len())
    }
}
