use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use super::ReferralStore;

#[cfg(test)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferralRecord {
    pub id: String,
    pub chat_id: i64,
    pub referral_id: Option<String>,
    pub created_at: String,
}

/// SQLite-backed referral log, one row per /start
#[derive(Clone)]
pub struct SqliteReferralStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteReferralStore {
    /// Open or create the database at the given path
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;

        // journal_mode PRAGMA returns the resulting mode, so use query_row
        let _: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;

        // Migrate before wrapping in the async Mutex
        Self::run_migrations(&conn)?;

        info!("Referral store initialized at: {}", path.display());
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory database (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::run_migrations(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn run_migrations(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS referrals (
                id TEXT PRIMARY KEY,
                chat_id INTEGER NOT NULL,
                referral_id TEXT,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX IF NOT EXISTS idx_referrals_chat
                ON referrals(chat_id, created_at);
            ",
        )
        .context("Failed to run referral migrations")?;
        Ok(())
    }

    /// All referrals recorded for a chat, oldest first
    #[cfg(test)]
    pub async fn list_for_chat(&self, chat_id: i64) -> Result<Vec<ReferralRecord>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, chat_id, referral_id, created_at FROM referrals
             WHERE chat_id = ?1
             ORDER BY created_at ASC, rowid ASC",
        )?;

        let rows = stmt
            .query_map(rusqlite::params![chat_id], |row| {
                Ok(ReferralRecord {
                    id: row.get(0)?,
                    chat_id: row.get(1)?,
                    referral_id: row.get(2)?,
                    created_at: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to load referrals")?;

        Ok(rows)
    }
}

#[async_trait]
impl ReferralStore for SqliteReferralStore {
    async fn save(&self, chat_id: i64, referral_id: Option<&str>) -> Result<()> {
        let id = Uuid::new_v4().to_string();
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO referrals (id, chat_id, referral_id) VALUES (?1, ?2, ?3)",
            rusqlite::params![&id, chat_id, referral_id],
        )
        .context("Failed to save referral")?;
        debug!("Stored referral {} for chat {}", id, chat_id);
        Ok(())
    }
}
