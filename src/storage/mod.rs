use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

/// Shared SQLite handle backing the session, tenant, idempotency and deal
/// submission tables.
pub struct Database {
    conn: Mutex<Connection>,
    db_path: String,
}

impl Database {
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).with_context(|| {
                format!(
                    "Failed to create database parent directory: {}",
                    parent.display()
                )
            })?;
        }

        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open database at: {}", db_path.display()))?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;
             PRAGMA busy_timeout=3000;",
        )?;

        let db = Self {
            conn: Mutex::new(conn),
            db_path: db_path.to_string_lossy().to_string(),
        };
        db.ensure_schema().with_context(|| {
            format!(
                "Failed to initialize database schema at: {}",
                db_path.display()
            )
        })?;
        debug!("database ready at {}", db.db_path);
        Ok(db)
    }

    /// Private in-memory database, used by tests and `config check`.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Mutex::new(conn),
            db_path: ":memory:".to_string(),
        };
        db.ensure_schema()?;
        Ok(db)
    }

    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Run `f` with exclusive access to the connection.
    pub fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> Result<T> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
        Ok(f(&conn)?)
    }

    fn ensure_schema(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "CREATE TABLE IF NOT EXISTS sessions (
                    session_key TEXT PRIMARY KEY,
                    tenant_id TEXT NOT NULL,
                    user_contact TEXT NOT NULL,
                    record TEXT NOT NULL,
                    updated_at_ms INTEGER NOT NULL,
                    expires_at_ms INTEGER NOT NULL
                )",
                [],
            )?;
            conn.execute(
                "CREATE INDEX IF NOT EXISTS idx_sessions_expiry ON sessions (expires_at_ms)",
                [],
            )?;

            conn.execute(
                "CREATE TABLE IF NOT EXISTS tenant_tokens (
                    tenant_id TEXT PRIMARY KEY,
                    phone_number_id TEXT NOT NULL UNIQUE,
                    config TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                )",
                [],
            )?;

            conn.execute(
                "CREATE TABLE IF NOT EXISTS processed_messages (
                    tenant_id TEXT NOT NULL,
                    message_id TEXT NOT NULL,
                    processed_at_ms INTEGER NOT NULL,
                    PRIMARY KEY (tenant_id, message_id)
                )",
                [],
            )?;

            conn.execute(
                "CREATE TABLE IF NOT EXISTS deal_submissions (
                    deal_id TEXT PRIMARY KEY,
                    tenant_id TEXT NOT NULL,
                    user_contact TEXT NOT NULL,
                    payload TEXT NOT NULL,
                    status TEXT NOT NULL,
                    platforms_posted TEXT NOT NULL DEFAULT '[]',
                    platforms_failed TEXT NOT NULL DEFAULT '[]',
                    updated_at TEXT NOT NULL
                )",
                [],
            )?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests;
