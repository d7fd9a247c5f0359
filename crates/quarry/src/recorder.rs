//! Result recorder.
//!
//! Consumes analysis results exactly once: persists scanned outcomes,
//! counts unavailable ones, and triggers feed regeneration whenever a
//! newly persisted record qualifies.

use crate::feed::FeedGenerator;
use chrono::Utc;
use quarry_db::{ScanDb, ScanRecord};
use quarry_protocol::{AnalysisOutcome, AnalysisResult, RuleFingerprint};
use tracing::{debug, error};

/// Per-run counters, passed explicitly instead of living in globals.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    /// Results persisted this run.
    pub analyzed: u64,
    /// Artifacts skipped by the decision engine.
    pub skipped: u64,
    /// Artifacts whose bytes could not be retrieved.
    pub unavailable: u64,
    /// Per-record persistence failures (logged, not fatal).
    pub persist_failures: u64,
}

pub struct Recorder {
    db: ScanDb,
    fingerprint: RuleFingerprint,
}

impl Recorder {
    pub fn new(db: ScanDb, fingerprint: RuleFingerprint) -> Self {
        Self { db, fingerprint }
    }

    /// Record a batch of results. Persistence failures are isolated
    /// per result; the batch always runs to completion.
    pub async fn record(
        &self,
        results: &[AnalysisResult],
        feed: &FeedGenerator,
        stats: &mut RunStats,
    ) {
        for result in results {
            match &result.outcome {
                AnalysisOutcome::Unavailable => {
                    stats.unavailable += 1;
                }
                AnalysisOutcome::Scanned {
                    score,
                    short_result,
                    long_result,
                    error,
                } => {
                    if let Some(message) = error {
                        error!(artifact = %result.id, error = %message, "Engine reported an error");
                    }
                    debug!(artifact = %result.id, score, detail = %long_result, "Recording scan result");

                    let record = ScanRecord {
                        artifact_id: result.id.clone(),
                        last_scan_at: Utc::now(),
                        score: *score,
                        last_error: error.clone(),
                        last_success: short_result.clone(),
                        rules_fingerprint: self.fingerprint.to_json(),
                    };

                    if let Err(err) = self.db.upsert_scan(&record).await {
                        error!(artifact = %result.id, error = %err, "Failed to persist scan result");
                        stats.persist_failures += 1;
                        continue;
                    }
                    stats.analyzed += 1;

                    if *score > 0 {
                        if let Err(err) = feed.regenerate().await {
                            error!(error = %err, "Feed regeneration failed");
                        }
                    }
                }
            }
        }
    }
}
