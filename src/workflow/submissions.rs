use super::{DealPayload, DealSubmission, StatusCallback};
use crate::storage::Database;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};
use std::sync::Arc;

/// `deal_submissions` table access.
pub struct DealSubmissions {
    db: Arc<Database>,
}

impl DealSubmissions {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert or replace a submission.
    pub fn save(&self, submission: &DealSubmission) -> Result<()> {
        let payload = serde_json::to_string(&submission.payload)?;
        let posted = serde_json::to_string(&submission.platforms_posted)?;
        let failed = serde_json::to_string(&submission.platforms_failed)?;
        let p = &submission.payload;
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO deal_submissions
                    (deal_id, tenant_id, user_contact, payload, status,
                     platforms_posted, platforms_failed, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(deal_id) DO UPDATE SET
                    payload = excluded.payload,
                    status = excluded.status,
                    platforms_posted = excluded.platforms_posted,
                    platforms_failed = excluded.platforms_failed,
                    updated_at = excluded.updated_at",
                params![
                    p.deal_id,
                    p.tenant_id,
                    p.submitted_by,
                    payload,
                    submission.status,
                    posted,
                    failed,
                    submission.updated_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
    }

    pub fn get(&self, deal_id: &str) -> Result<Option<DealSubmission>> {
        let row = self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT payload, status, platforms_posted, platforms_failed, updated_at
                 FROM deal_submissions WHERE deal_id = ?1",
                params![deal_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()
        })?;

        let Some((payload, status, posted, failed, updated_at)) = row else {
            return Ok(None);
        };
        Ok(Some(DealSubmission {
            payload: serde_json::from_str::<DealPayload>(&payload)
                .with_context(|| format!("corrupt payload for deal {}", deal_id))?,
            status,
            platforms_posted: serde_json::from_str(&posted).unwrap_or_default(),
            platforms_failed: serde_json::from_str(&failed).unwrap_or_default(),
            updated_at: DateTime::parse_from_rfc3339(&updated_at)
                .map_or_else(|_| Utc::now(), |t| t.with_timezone(&Utc)),
        }))
    }

    pub fn set_status(&self, deal_id: &str, status: &str) -> Result<bool> {
        let changed = self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE deal_submissions SET status = ?2, updated_at = ?3 WHERE deal_id = ?1",
                params![deal_id, status, Utc::now().to_rfc3339()],
            )
        })?;
        Ok(changed > 0)
    }

    /// Record a workflow status callback. Returns the updated submission, or
    /// `None` for an unknown deal.
    pub fn apply_callback(&self, update: &StatusCallback) -> Result<Option<DealSubmission>> {
        let Some(mut submission) = self.get(&update.deal_id)? else {
            return Ok(None);
        };
        submission.status.clone_from(&update.status);
        submission.platforms_posted.clone_from(&update.platforms_posted);
        submission.platforms_failed.clone_from(&update.platforms_failed);
        submission.updated_at = Utc::now();
        self.save(&submission)?;
        Ok(Some(submission))
    }
}
