//! Rule-set fingerprint.
//!
//! A fingerprint is the lexicographically sorted list of content
//! hashes of every active rule file. Two fingerprints are equal iff
//! the sorted sequences are identical, so file order on disk never
//! matters. The serialized form (a JSON string array) is stored on
//! each scan record to detect rule-set drift.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when a stored fingerprint cannot be decoded.
#[derive(Debug, Error)]
pub enum FingerprintParseError {
    #[error("Stored fingerprint is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Order-independent fingerprint of the active rule set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleFingerprint {
    hashes: Vec<String>,
}

impl RuleFingerprint {
    /// Build a fingerprint from per-file content hashes. Sorts the
    /// input so callers do not have to care about enumeration order.
    pub fn from_hashes(mut hashes: Vec<String>) -> Self {
        hashes.sort();
        Self { hashes }
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn hashes(&self) -> &[String] {
        &self.hashes
    }

    /// Serialized form stored in `scan_records.rules_fingerprint`.
    pub fn to_json(&self) -> String {
        // A Vec<String> always serializes.
        serde_json::to_string(&self.hashes).unwrap_or_default()
    }

    pub fn from_json(raw: &str) -> Result<Self, FingerprintParseError> {
        let hashes: Vec<String> = serde_json::from_str(raw)?;
        Ok(Self::from_hashes(hashes))
    }
}
