//! Rescan decision engine.
//!
//! The sole gate controlling scan volume. Pure function; the caller
//! supplies the stored record (if any) and the current fingerprint.

use quarry_db::ScanRecord;
use quarry_protocol::RuleFingerprint;
use tracing::warn;

/// Outcome of the rescan gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanDecision {
    Scan,
    Skip(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Operator opted into scan-once semantics and the record has a
    /// stored fingerprint (matching or not).
    RescanDisabled,
    /// The record was produced under the current rule set.
    FingerprintCurrent,
}

impl ScanDecision {
    pub fn is_scan(&self) -> bool {
        matches!(self, ScanDecision::Scan)
    }
}

/// Decide whether an artifact must be (re)scanned.
///
/// Precedence, in order:
/// 1. no record -> scan
/// 2. rescan disabled and any stored fingerprint -> skip
/// 3. stored fingerprint fails to parse -> scan (fail toward correctness)
/// 4. stored fingerprint equals the current one -> skip
/// 5. otherwise -> scan
pub fn should_scan(
    record: Option<&ScanRecord>,
    current: &RuleFingerprint,
    rescan_disabled: bool,
) -> ScanDecision {
    let record = match record {
        Some(record) => record,
        None => return ScanDecision::Scan,
    };

    if rescan_disabled && !record.rules_fingerprint.is_empty() {
        return ScanDecision::Skip(SkipReason::RescanDisabled);
    }

    match RuleFingerprint::from_json(&record.rules_fingerprint) {
        Ok(stored) if stored == *current => ScanDecision::Skip(SkipReason::FingerprintCurrent),
        Ok(_) => ScanDecision::Scan,
        Err(err) => {
            warn!(
                artifact = %record.artifact_id,
                error = %err,
                "Unable to decode stored rule fingerprint; forcing rescan"
            );
            ScanDecision::Scan
        }
    }
}
