//! Scan engine and execution substrate seams.
//!
//! These traits are the boundary to the pattern-matching engine and
//! the distributed execution substrate. The dispatcher only depends on
//! the contracts here, so backends can be swapped without touching the
//! orchestration core.

use async_trait::async_trait;
use quarry_protocol::{AnalysisResult, ArtifactId};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, Instant};
use tracing::warn;

/// Errors surfaced by a scan engine or execution substrate.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Engine I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Scan engine failure: {0}")]
    Failed(String),

    #[error("Result retrieval timed out after {0:?}")]
    CollectTimeout(Duration),
}

impl EngineError {
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}

/// In-process scan engine: one artifact in, one result out.
///
/// An unobtainable artifact is a successful call returning an
/// `Unavailable` result, not an error; errors mean the engine itself
/// broke.
#[async_trait]
pub trait ScanEngine: Send + Sync {
    async fn analyze(&self, id: &ArtifactId) -> Result<AnalysisResult, EngineError>;
}

/// A submitted group of independent work units.
#[async_trait]
pub trait RemoteBatch: Send {
    /// Non-blocking completion probe.
    fn is_ready(&self) -> bool;

    /// Whether every unit in the group completed without substrate
    /// failure. Only meaningful once `is_ready` returns true.
    fn is_successful(&self) -> bool;

    /// Retrieve the group's results, waiting at most `timeout`.
    async fn collect(&mut self, timeout: Duration) -> Result<Vec<AnalysisResult>, EngineError>;
}

/// Execution substrate accepting a batch of artifact ids.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    async fn submit(&self, ids: &[ArtifactId]) -> Result<Box<dyn RemoteBatch>, EngineError>;
}

// ----------------------------------------------------------------------------
// In-process worker-pool substrate
// ----------------------------------------------------------------------------

type GroupSlot = Arc<Mutex<Option<Result<Vec<AnalysisResult>, String>>>>;

/// Worker-pool substrate that fans a batch out to concurrent tasks on
/// the local runtime. Implements the same dispatch contract a real
/// remote substrate would, so `remote` mode works on a single host and
/// the distributed dispatch path gets exercised end to end.
pub struct InProcessExecutor {
    engine: Arc<dyn ScanEngine>,
}

impl InProcessExecutor {
    pub fn new(engine: Arc<dyn ScanEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl RemoteExecutor for InProcessExecutor {
    async fn submit(&self, ids: &[ArtifactId]) -> Result<Box<dyn RemoteBatch>, EngineError> {
        let slot: GroupSlot = Arc::new(Mutex::new(None));
        let engine = Arc::clone(&self.engine);
        let ids = ids.to_vec();
        let task_slot = Arc::clone(&slot);

        tokio::spawn(async move {
            let mut units = Vec::with_capacity(ids.len());
            for id in ids {
                let engine = Arc::clone(&engine);
                units.push(tokio::spawn(async move { engine.analyze(&id).await }));
            }

            let mut results = Vec::with_capacity(units.len());
            let mut failure: Option<String> = None;
            for unit in units {
                match unit.await {
                    Ok(Ok(result)) => results.push(result),
                    Ok(Err(err)) => failure = Some(err.to_string()),
                    Err(err) => failure = Some(format!("worker task panicked: {err}")),
                }
            }

            let outcome = match failure {
                Some(message) => {
                    warn!(error = %message, "Worker group unit failed");
                    Err(message)
                }
                None => Ok(results),
            };
            if let Ok(mut guard) = task_slot.lock() {
                *guard = Some(outcome);
            }
        });

        Ok(Box::new(InProcessBatch { slot }))
    }
}

struct InProcessBatch {
    slot: GroupSlot,
}

impl InProcessBatch {
    fn peek(&self) -> Option<bool> {
        self.slot
            .lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|outcome| outcome.is_ok()))
    }
}

#[async_trait]
impl RemoteBatch for InProcessBatch {
    fn is_ready(&self) -> bool {
        self.peek().is_some()
    }

    fn is_successful(&self) -> bool {
        self.peek().unwrap_or(false)
    }

    async fn collect(&mut self, timeout: Duration) -> Result<Vec<AnalysisResult>, EngineError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Ok(mut guard) = self.slot.lock() {
                if let Some(outcome) = guard.take() {
                    return outcome.map_err(EngineError::Failed);
                }
            }
            if Instant::now() >= deadline {
                return Err(EngineError::CollectTimeout(timeout));
            }
            sleep(Duration::from_millis(10)).await;
        }
    }
}
