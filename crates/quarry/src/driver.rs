//! Scan loop driver.
//!
//! Enumerates the module store snapshot in time order, gates each
//! artifact through the rescan decision, accumulates accepted ids into
//! bounded batches, and flushes each batch through dispatch and
//! recording. A periodic maintenance command is interleaved between
//! artifacts so one oversized enumeration cannot starve it.

use crate::config::Config;
use crate::decision::should_scan;
use crate::dispatch::Dispatcher;
use crate::feed::FeedGenerator;
use crate::maintenance::run_maintenance;
use crate::recorder::{Recorder, RunStats};
use crate::source::ArtifactSource;
use anyhow::Result;
use chrono::{Duration as ChronoDuration, Utc};
use quarry_db::ScanDb;
use quarry_protocol::{ArtifactId, RuleFingerprint};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};

/// Driver knobs, derived from the loaded `Config`.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub max_batch_size: usize,
    pub disable_rescan: bool,
    pub artifact_window_days: i64,
    pub maintenance_script: Option<String>,
    /// Zero disables the maintenance trigger.
    pub maintenance_interval: Duration,
}

impl From<&Config> for DriverConfig {
    fn from(config: &Config) -> Self {
        Self {
            max_batch_size: config.max_batch_size,
            disable_rescan: config.disable_rescan,
            artifact_window_days: config.artifact_window_days,
            maintenance_script: config.maintenance_script.clone(),
            maintenance_interval: Duration::from_secs(config.maintenance_interval_secs),
        }
    }
}

/// Aggregated outcome of one full run.
#[derive(Debug, Clone, Copy)]
pub struct RunSummary {
    /// Identifiers enumerated from the module store.
    pub total: u64,
    /// Identifiers accepted for scanning this run.
    pub queued: u64,
    pub stats: RunStats,
    pub interrupted: bool,
    pub elapsed: Duration,
}

pub struct ScanDriver {
    db: ScanDb,
    source: Arc<dyn ArtifactSource>,
    dispatcher: Dispatcher,
    recorder: Recorder,
    feed: FeedGenerator,
    fingerprint: RuleFingerprint,
    config: DriverConfig,
    shutdown: Arc<AtomicBool>,
}

impl ScanDriver {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: ScanDb,
        source: Arc<dyn ArtifactSource>,
        dispatcher: Dispatcher,
        recorder: Recorder,
        feed: FeedGenerator,
        fingerprint: RuleFingerprint,
        config: DriverConfig,
    ) -> Self {
        Self {
            db,
            source,
            dispatcher,
            recorder,
            feed,
            fingerprint,
            config,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag checked between artifacts; setting it stops the loop
    /// cleanly after the current record write.
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    pub async fn run(&self) -> Result<RunSummary> {
        let started = Instant::now();
        let cutoff = Utc::now() - ChronoDuration::days(self.config.artifact_window_days);

        let ids = self.source.artifacts_since(cutoff).await?;
        info!(
            artifacts = ids.len(),
            cutoff = %cutoff,
            "Enumerating module store snapshot"
        );

        let mut stats = RunStats::default();
        let mut batch: Vec<ArtifactId> = Vec::with_capacity(self.config.max_batch_size);
        let mut total: u64 = 0;
        let mut queued: u64 = 0;
        let mut last_maintenance = Instant::now();
        let mut interrupted = false;

        for id in ids {
            if self.shutdown.load(Ordering::SeqCst) {
                info!("Interrupt observed; stopping enumeration");
                interrupted = true;
                break;
            }

            self.maybe_run_maintenance(&mut last_maintenance).await;

            total += 1;
            let record = self.db.get_record(&id).await?;
            if should_scan(record.as_ref(), &self.fingerprint, self.config.disable_rescan).is_scan()
            {
                queued += 1;
                batch.push(id);
            } else {
                stats.skipped += 1;
            }

            if batch.len() >= self.config.max_batch_size {
                self.flush(&mut batch, &mut stats).await;
            }
        }

        // An interrupt abandons the pending batch; records are
        // untouched, so those ids are picked up on the next run.
        if !batch.is_empty() && !interrupted {
            self.flush(&mut batch, &mut stats).await;
        }

        // The feed must reflect final state even when no qualifying
        // result landed during the run.
        if let Err(err) = self.feed.regenerate().await {
            error!(error = %err, "Final feed regeneration failed");
        }

        let summary = RunSummary {
            total,
            queued,
            stats,
            interrupted,
            elapsed: started.elapsed(),
        };
        self.log_summary(&summary).await;
        Ok(summary)
    }

    async fn maybe_run_maintenance(&self, last: &mut Instant) {
        if self.config.maintenance_interval.is_zero() {
            return;
        }
        if last.elapsed() < self.config.maintenance_interval {
            return;
        }
        if let Some(script) = &self.config.maintenance_script {
            run_maintenance(script).await;
        }
        *last = Instant::now();
    }

    async fn flush(&self, batch: &mut Vec<ArtifactId>, stats: &mut RunStats) {
        let ids = std::mem::take(batch);
        match self.dispatcher.dispatch(&ids).await {
            Ok(results) => {
                self.recorder.record(&results, &self.feed, stats).await;
            }
            Err(err) => {
                // Records stay untouched; these ids are retried on the
                // next full run.
                error!(error = %err, units = ids.len(), "Batch dropped");
            }
        }
    }

    async fn log_summary(&self, summary: &RunSummary) {
        info!(
            elapsed_secs = summary.elapsed.as_secs(),
            total = summary.total,
            queued = summary.queued,
            analyzed = summary.stats.analyzed,
            skipped = summary.stats.skipped,
            unavailable = summary.stats.unavailable,
            persist_failures = summary.stats.persist_failures,
            "Run complete"
        );
        match self.db.count_qualifying().await {
            Ok(count) => info!(qualifying = count, "Records with score above zero"),
            Err(err) => error!(error = %err, "Failed to count qualifying records"),
        }
    }
}
