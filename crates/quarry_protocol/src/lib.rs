//! Core data model for the Quarry scan agent.
//!
//! Everything that crosses a component boundary lives here: artifact
//! identifiers, rule-set fingerprints, per-artifact analysis results
//! and the published feed shapes. No I/O in this crate.

pub mod feed;
pub mod fingerprint;
pub mod ids;
pub mod result;

// Re-export types for convenience
pub use feed::{Feed, FeedInfo, FeedReport};
pub use fingerprint::{FingerprintParseError, RuleFingerprint};
pub use ids::{ArtifactId, IdParseError};
pub use result::{AnalysisOutcome, AnalysisResult, UNAVAILABLE_SCORE};
