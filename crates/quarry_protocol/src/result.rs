//! Per-artifact analysis results produced by the scan engine.

use crate::ids::ArtifactId;
use serde::{Deserialize, Serialize};

/// Sentinel score stored when an artifact's bytes could not be read.
/// Normal scores are >= 0.
pub const UNAVAILABLE_SCORE: i64 = -1;

/// What the engine found for one artifact.
///
/// The two branches are mutually exclusive: an unavailable artifact
/// carries no score or match text, and a scanned artifact is always
/// available. Results for unavailable artifacts are counted but never
/// persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AnalysisOutcome {
    /// The artifact bytes could not be retrieved.
    Unavailable,
    /// The artifact was scanned under the current rule set.
    Scanned {
        score: i64,
        /// One-line summary (matched rule names), shown as feed title.
        short_result: String,
        /// Full match detail.
        long_result: String,
        /// Engine-reported error, if any.
        error: Option<String>,
    },
}

/// One unit of completed work, consumed exactly once by the recorder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub id: ArtifactId,
    #[serde(flatten)]
    pub outcome: AnalysisOutcome,
}

impl AnalysisResult {
    pub fn unavailable(id: ArtifactId) -> Self {
        Self {
            id,
            outcome: AnalysisOutcome::Unavailable,
        }
    }

    pub fn scanned(
        id: ArtifactId,
        score: i64,
        short_result: impl Into<String>,
        long_result: impl Into<String>,
    ) -> Self {
        Self {
            id,
            outcome: AnalysisOutcome::Scanned {
                score: score.max(0),
                short_result: short_result.into(),
                long_result: long_result.into(),
                error: None,
            },
        }
    }

    /// A scan that completed but reported an engine-side error.
    /// Scores zero so the artifact never qualifies for the feed.
    pub fn engine_error(id: ArtifactId, message: impl Into<String>) -> Self {
        Self {
            id,
            outcome: AnalysisOutcome::Scanned {
                score: 0,
                short_result: String::new(),
                long_result: String::new(),
                error: Some(message.into()),
            },
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self.outcome, AnalysisOutcome::Unavailable)
    }

    pub fn score(&self) -> i64 {
        match &self.outcome {
            AnalysisOutcome::Unavailable => UNAVAILABLE_SCORE,
            AnalysisOutcome::Scanned { score, .. } => *score,
        }
    }
}
