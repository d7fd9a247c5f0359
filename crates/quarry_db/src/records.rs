//! Scan record operations.

use crate::error::{DbError, Result};
use crate::types::ScanRecord;
use crate::ScanDb;
use chrono::{DateTime, Utc};
use quarry_protocol::ArtifactId;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

impl ScanDb {
    /// Fetch the record for one artifact, if any.
    pub async fn get_record(&self, id: &ArtifactId) -> Result<Option<ScanRecord>> {
        let row = sqlx::query("SELECT * FROM scan_records WHERE artifact_id = ?")
            .bind(id.as_str())
            .fetch_optional(self.pool())
            .await?;

        match row {
            Some(row) => Ok(Some(row_to_record(&row)?)),
            None => Ok(None),
        }
    }

    /// Get-or-create plus update in one atomic statement.
    ///
    /// Every scan field is overwritten; a rescan fully replaces the
    /// previous observation for that artifact.
    pub async fn upsert_scan(&self, record: &ScanRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO scan_records
                (artifact_id, last_scan_at, score, last_error, last_success, rules_fingerprint)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(artifact_id) DO UPDATE SET
                last_scan_at = excluded.last_scan_at,
                score = excluded.score,
                last_error = excluded.last_error,
                last_success = excluded.last_success,
                rules_fingerprint = excluded.rules_fingerprint
            "#,
        )
        .bind(record.artifact_id.as_str())
        .bind(record.last_scan_at.to_rfc3339())
        .bind(record.score)
        .bind(record.last_error.as_deref())
        .bind(&record.last_success)
        .bind(&record.rules_fingerprint)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// All records with a positive score, ordered by artifact id so
    /// feed output is stable across regenerations.
    pub async fn qualifying_records(&self) -> Result<Vec<ScanRecord>> {
        let rows = sqlx::query("SELECT * FROM scan_records WHERE score > 0 ORDER BY artifact_id")
            .fetch_all(self.pool())
            .await?;

        rows.iter().map(row_to_record).collect()
    }

    /// Number of qualifying records (cheap, for end-of-run reporting).
    pub async fn count_qualifying(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM scan_records WHERE score > 0")
            .fetch_one(self.pool())
            .await?;
        Ok(row.get::<i64, _>("n"))
    }

    /// Total number of records.
    pub async fn count_records(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM scan_records")
            .fetch_one(self.pool())
            .await?;
        Ok(row.get::<i64, _>("n"))
    }
}

fn row_to_record(row: &SqliteRow) -> Result<ScanRecord> {
    let raw_id: String = row.get("artifact_id");
    let artifact_id = ArtifactId::parse(&raw_id)
        .map_err(|e| DbError::corrupt(format!("bad artifact id '{raw_id}': {e}")))?;

    let raw_ts: String = row.get("last_scan_at");
    let last_scan_at = DateTime::parse_from_rfc3339(&raw_ts)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DbError::corrupt(format!("bad timestamp '{raw_ts}': {e}")))?;

    Ok(ScanRecord {
        artifact_id,
        last_scan_at,
        score: row.get("score"),
        last_error: row.get("last_error"),
        last_success: row.get("last_success"),
        rules_fingerprint: row.get("rules_fingerprint"),
    })
}
