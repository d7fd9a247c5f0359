//! Batch dispatcher.
//!
//! One batch per call, local or distributed. Every failure mode
//! degrades to "no results for this batch": the affected identifiers
//! keep their unchanged records and are reconsidered on the next run.

use crate::engine::{RemoteExecutor, ScanEngine};
use quarry_protocol::{AnalysisResult, ArtifactId};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, Instant};
use tracing::{debug, error};

/// How a batch is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// Sequential, in-process.
    Local,
    /// Fanned out to the execution substrate as one group.
    Distributed,
}

/// Timing knobs for the dispatcher. Defaults match production; tests
/// shrink them.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Hard wall-clock bound on distributed group completion.
    pub group_deadline: Duration,
    /// Interval between non-blocking completion probes.
    pub poll_interval: Duration,
    /// Secondary bound on retrieving a completed group's results.
    pub collect_timeout: Duration,
    /// Pause after a failed batch to avoid hot-looping on a
    /// persistent error.
    pub failure_cooldown: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            group_deadline: Duration::from_secs(120),
            poll_interval: Duration::from_millis(100),
            collect_timeout: Duration::from_secs(30),
            failure_cooldown: Duration::from_secs(5),
        }
    }
}

/// Why a batch produced no results.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Batch timed out after {0:?}")]
    Timeout(Duration),

    #[error("Batch submission failed: {0}")]
    Submission(String),

    #[error("Result retrieval failed: {0}")]
    Retrieval(String),

    #[error("Local scan failed: {0}")]
    Engine(String),
}

pub struct Dispatcher {
    mode: DispatchMode,
    engine: Arc<dyn ScanEngine>,
    remote: Option<Arc<dyn RemoteExecutor>>,
    config: DispatchConfig,
}

impl Dispatcher {
    pub fn local(engine: Arc<dyn ScanEngine>, config: DispatchConfig) -> Self {
        Self {
            mode: DispatchMode::Local,
            engine,
            remote: None,
            config,
        }
    }

    pub fn distributed(
        engine: Arc<dyn ScanEngine>,
        remote: Arc<dyn RemoteExecutor>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            mode: DispatchMode::Distributed,
            engine,
            remote: Some(remote),
            config,
        }
    }

    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    /// Execute one batch. On any failure the whole batch yields no
    /// results; partial harvests are never returned.
    pub async fn dispatch(
        &self,
        ids: &[ArtifactId],
    ) -> Result<Vec<AnalysisResult>, DispatchError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        match self.mode {
            DispatchMode::Local => self.dispatch_local(ids).await,
            DispatchMode::Distributed => self.dispatch_distributed(ids).await,
        }
    }

    /// Sequential scan; the first failing unit aborts the batch.
    async fn dispatch_local(
        &self,
        ids: &[ArtifactId],
    ) -> Result<Vec<AnalysisResult>, DispatchError> {
        let mut results = Vec::with_capacity(ids.len());
        for id in ids {
            match self.engine.analyze(id).await {
                Ok(result) => results.push(result),
                Err(err) => {
                    error!(artifact = %id, error = %err, "Local scan failed; dropping batch");
                    sleep(self.config.failure_cooldown).await;
                    return Err(DispatchError::Engine(err.to_string()));
                }
            }
        }
        Ok(results)
    }

    /// Group submission with a bounded, short-interval poll wait.
    async fn dispatch_distributed(
        &self,
        ids: &[ArtifactId],
    ) -> Result<Vec<AnalysisResult>, DispatchError> {
        let remote = self
            .remote
            .as_ref()
            .ok_or_else(|| DispatchError::Submission("no execution substrate configured".into()))?;

        let mut batch = match remote.submit(ids).await {
            Ok(batch) => batch,
            Err(err) => {
                error!(error = %err, units = ids.len(), "Batch submission failed");
                sleep(self.config.failure_cooldown).await;
                return Err(DispatchError::Submission(err.to_string()));
            }
        };

        let started = Instant::now();
        while !batch.is_ready() {
            if started.elapsed() >= self.config.group_deadline {
                debug!(units = ids.len(), "Group did not complete within the deadline");
                return Err(DispatchError::Timeout(self.config.group_deadline));
            }
            sleep(self.config.poll_interval).await;
        }

        if !batch.is_successful() {
            sleep(self.config.failure_cooldown).await;
            return Err(DispatchError::Retrieval("group reported failure".into()));
        }

        match batch.collect(self.config.collect_timeout).await {
            Ok(results) => Ok(results),
            Err(err) => {
                error!(error = %err, "Result retrieval failed");
                sleep(self.config.failure_cooldown).await;
                Err(DispatchError::Retrieval(err.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineError, RemoteBatch};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ids(n: usize) -> Vec<ArtifactId> {
        (0..n)
            .map(|i| ArtifactId::parse(&format!("{i:02x}").repeat(16)).unwrap())
            .collect()
    }

    fn test_config() -> DispatchConfig {
        DispatchConfig {
            group_deadline: Duration::from_millis(60),
            poll_interval: Duration::from_millis(5),
            collect_timeout: Duration::from_millis(60),
            failure_cooldown: Duration::from_millis(1),
        }
    }

    /// Engine that succeeds until `fail_after` calls, then errors.
    struct CountingEngine {
        calls: AtomicUsize,
        fail_after: usize,
    }

    impl CountingEngine {
        fn new(fail_after: usize) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_after,
            }
        }
    }

    #[async_trait]
    impl ScanEngine for CountingEngine {
        async fn analyze(&self, id: &ArtifactId) -> Result<AnalysisResult, EngineError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call >= self.fail_after {
                return Err(EngineError::failed("boom"));
            }
            Ok(AnalysisResult::scanned(id.clone(), 1, "m", "m"))
        }
    }

    /// Substrate whose batches never become ready.
    struct StalledExecutor;

    struct StalledBatch;

    #[async_trait]
    impl RemoteBatch for StalledBatch {
        fn is_ready(&self) -> bool {
            false
        }
        fn is_successful(&self) -> bool {
            false
        }
        async fn collect(
            &mut self,
            timeout: Duration,
        ) -> Result<Vec<AnalysisResult>, EngineError> {
            Err(EngineError::CollectTimeout(timeout))
        }
    }

    #[async_trait]
    impl RemoteExecutor for StalledExecutor {
        async fn submit(&self, _ids: &[ArtifactId]) -> Result<Box<dyn RemoteBatch>, EngineError> {
            Ok(Box::new(StalledBatch))
        }
    }

    /// Substrate that refuses submissions outright.
    struct RejectingExecutor;

    #[async_trait]
    impl RemoteExecutor for RejectingExecutor {
        async fn submit(&self, _ids: &[ArtifactId]) -> Result<Box<dyn RemoteBatch>, EngineError> {
            Err(EngineError::failed("broker unreachable"))
        }
    }

    #[tokio::test]
    async fn local_batch_returns_all_results() {
        let dispatcher = Dispatcher::local(Arc::new(CountingEngine::new(usize::MAX)), test_config());
        let results = dispatcher.dispatch(&ids(3)).await.unwrap();
        assert_eq!(results.len(), 3);
    }

    #[tokio::test]
    async fn local_failure_drops_whole_batch() {
        let engine = Arc::new(CountingEngine::new(1));
        let dispatcher = Dispatcher::local(engine.clone(), test_config());

        let err = dispatcher.dispatch(&ids(3)).await.unwrap_err();
        assert!(matches!(err, DispatchError::Engine(_)));
        // Fail-fast: the third unit is never attempted
        assert_eq!(engine.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn distributed_timeout_yields_no_partial_results() {
        let dispatcher = Dispatcher::distributed(
            Arc::new(CountingEngine::new(usize::MAX)),
            Arc::new(StalledExecutor),
            test_config(),
        );

        let err = dispatcher.dispatch(&ids(2)).await.unwrap_err();
        assert!(matches!(err, DispatchError::Timeout(_)));
    }

    #[tokio::test]
    async fn submission_failure_is_reported_as_such() {
        let dispatcher = Dispatcher::distributed(
            Arc::new(CountingEngine::new(usize::MAX)),
            Arc::new(RejectingExecutor),
            test_config(),
        );

        let err = dispatcher.dispatch(&ids(2)).await.unwrap_err();
        assert!(matches!(err, DispatchError::Submission(_)));
    }

    #[tokio::test]
    async fn empty_batch_is_a_no_op() {
        let dispatcher = Dispatcher::local(Arc::new(CountingEngine::new(0)), test_config());
        let results = dispatcher.dispatch(&[]).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn distributed_success_via_in_process_pool() {
        use crate::engine::InProcessExecutor;

        let engine: Arc<dyn ScanEngine> = Arc::new(CountingEngine::new(usize::MAX));
        let dispatcher = Dispatcher::distributed(
            engine.clone(),
            Arc::new(InProcessExecutor::new(engine.clone())),
            DispatchConfig {
                group_deadline: Duration::from_secs(5),
                ..test_config()
            },
        );

        let results = dispatcher.dispatch(&ids(4)).await.unwrap();
        assert_eq!(results.len(), 4);
    }
}
