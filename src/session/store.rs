use crate::session::record::ConversationRecord;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Result of a conditional commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    /// Another writer committed first; the caller's snapshot is stale.
    Conflict,
}

/// Durable conversation records keyed by `tenant#user`.
///
/// `version` is the stored `updated_at` in milliseconds. A commit only
/// succeeds if the stored version still equals the one the caller read.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fetch a record, including expired ones. The returned record carries its version.
    async fn get(&self, key: &str) -> Result<Option<ConversationRecord>>;

    /// Write `record` if the stored version equals `expected` (`None` = no row yet).
    async fn compare_and_swap(
        &self,
        record: &ConversationRecord,
        expected: Option<i64>,
    ) -> Result<CommitOutcome>;

    /// Delete records whose expiry is at or before `now`. Returns rows removed.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize>;
}
