use crate::session::record::ConversationRecord;
use crate::session::store::{CommitOutcome, SessionStore};
use crate::storage::Database;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};
use std::sync::Arc;

/// `sessions` table; the record is stored as JSON next to its CAS version.
pub struct SqliteSessionStore {
    db: Arc<Database>,
}

impl SqliteSessionStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn get(&self, key: &str) -> Result<Option<ConversationRecord>> {
        let row: Option<(String, i64)> = self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT record, updated_at_ms FROM sessions WHERE session_key = ?1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
        })?;
        let Some((json, version)) = row else {
            return Ok(None);
        };
        let mut record: ConversationRecord = serde_json::from_str(&json)
            .with_context(|| format!("corrupt session record for {}", key))?;
        record.version = Some(version);
        Ok(Some(record))
    }

    async fn compare_and_swap(
        &self,
        record: &ConversationRecord,
        expected: Option<i64>,
    ) -> Result<CommitOutcome> {
        let key = record.session_key();
        let json = serde_json::to_string(record)?;
        let updated_at_ms = record.updated_at.timestamp_millis();
        let expires_at_ms = record.expires_at.timestamp_millis();

        let changed = self.db.with_conn(|conn| match expected {
            None => conn.execute(
                "INSERT INTO sessions
                    (session_key, tenant_id, user_contact, record, updated_at_ms, expires_at_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(session_key) DO NOTHING",
                params![
                    key,
                    record.tenant_id,
                    record.user,
                    json,
                    updated_at_ms,
                    expires_at_ms
                ],
            ),
            Some(version) => conn.execute(
                "UPDATE sessions
                 SET record = ?2, updated_at_ms = ?3, expires_at_ms = ?4
                 WHERE session_key = ?1 AND updated_at_ms = ?5",
                params![key, json, updated_at_ms, expires_at_ms, version],
            ),
        })?;

        Ok(if changed == 1 {
            CommitOutcome::Committed
        } else {
            CommitOutcome::Conflict
        })
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let removed = self.db.with_conn(|conn| {
            conn.execute(
                "DELETE FROM sessions WHERE expires_at_ms <= ?1",
                params![now.timestamp_millis()],
            )
        })?;
        Ok(removed)
    }
}
