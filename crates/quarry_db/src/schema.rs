//! Schema creation for the record store.
//!
//! All CREATE TABLE statements live here - single source of truth.

use crate::error::Result;
use crate::ScanDb;
use tracing::info;

impl ScanDb {
    /// Ensure all tables exist.
    pub(crate) async fn ensure_schema(&self) -> Result<()> {
        // WAL keeps per-record upserts cheap while the feed reader runs
        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(self.pool())
            .await?;
        sqlx::query("PRAGMA synchronous=NORMAL")
            .execute(self.pool())
            .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS scan_records (
                artifact_id TEXT PRIMARY KEY,
                last_scan_at TEXT NOT NULL,
                score INTEGER NOT NULL DEFAULT 0,
                last_error TEXT,
                last_success TEXT NOT NULL DEFAULT '',
                rules_fingerprint TEXT NOT NULL DEFAULT ''
            )"#,
        )
        .execute(self.pool())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_scan_records_score ON scan_records(score)")
            .execute(self.pool())
            .await?;

        info!("Record store schema verified");
        Ok(())
    }
}
