//! Feed generation.
//!
//! The published feed is always regenerated in full from the record
//! store; it reflects current store state, not an event log, so
//! repeated regeneration with an unchanged store is idempotent apart
//! from the generation timestamp.

use chrono::Utc;
use quarry_db::{DbError, ScanDb, ScanRecord};
use quarry_protocol::{Feed, FeedInfo, FeedReport};
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error(transparent)]
    Db(#[from] DbError),

    #[error("Feed serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to write feed file: {0}")]
    Io(#[from] std::io::Error),
}

pub struct FeedGenerator {
    db: ScanDb,
    info: FeedInfo,
    output_path: PathBuf,
}

impl FeedGenerator {
    pub fn new(db: ScanDb, info: FeedInfo, output_path: impl Into<PathBuf>) -> Self {
        Self {
            db,
            info,
            output_path: output_path.into(),
        }
    }

    pub fn output_path(&self) -> &PathBuf {
        &self.output_path
    }

    /// Rebuild the feed from every qualifying record and overwrite the
    /// output file.
    pub async fn regenerate(&self) -> Result<(), FeedError> {
        let records = self.db.qualifying_records().await?;
        let reports: Vec<FeedReport> = records.iter().map(record_to_report).collect();

        debug!(
            feed = %self.info.name,
            reports = reports.len(),
            path = %self.output_path.display(),
            "Writing feed"
        );

        let feed = Feed::new(self.info.clone(), reports);
        std::fs::write(&self.output_path, feed.to_json_pretty()?)?;
        Ok(())
    }
}

fn record_to_report(record: &ScanRecord) -> FeedReport {
    let digest = record.artifact_id.to_string();
    let mut iocs = BTreeMap::new();
    iocs.insert("sha256".to_string(), vec![digest.clone()]);

    FeedReport {
        id: format!("binary_{digest}"),
        title: record.last_success.clone(),
        description: record.last_success.clone(),
        timestamp: Utc::now().timestamp(),
        link: String::new(),
        score: record.score,
        iocs,
    }
}
