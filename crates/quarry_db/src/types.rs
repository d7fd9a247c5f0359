//! Record store row types.

use chrono::{DateTime, Utc};
use quarry_protocol::ArtifactId;

/// One row per artifact, keyed by artifact id.
///
/// This table is the sole memory of "have we scanned this, with which
/// rules". Rows are created on first sighting and mutated on every
/// completed rescan; this subsystem never deletes them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRecord {
    pub artifact_id: ArtifactId,
    pub last_scan_at: DateTime<Utc>,
    /// >= 0 for a completed scan. See `quarry_protocol::UNAVAILABLE_SCORE`.
    pub score: i64,
    pub last_error: Option<String>,
    /// One-line match summary from the last successful scan.
    pub last_success: String,
    /// Serialized `RuleFingerprint` captured when this row was written.
    /// Empty for rows migrated from stores that predate fingerprints.
    pub rules_fingerprint: String,
}
