//! Artifact identifier wrapper.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error returned when parsing an artifact identifier fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdParseError {
    message: String,
}

impl IdParseError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for IdParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for IdParseError {}

/// Accepted digest lengths in hex characters: MD5, SHA-1, SHA-256.
const DIGEST_HEX_LENGTHS: [usize; 3] = [32, 40, 64];

/// Content-hash identifier of a binary artifact.
///
/// Stored and compared as lowercase hex. Construction validates the
/// string so a malformed identifier can never reach the record store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactId(String);

impl ArtifactId {
    pub fn parse(value: &str) -> Result<Self, IdParseError> {
        let normalized = value.trim().to_ascii_lowercase();
        if !DIGEST_HEX_LENGTHS.contains(&normalized.len()) {
            return Err(IdParseError::new(format!(
                "Invalid artifact id length {} (expected 32, 40 or 64 hex chars)",
                normalized.len()
            )));
        }
        if !normalized.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(IdParseError::new(format!(
                "Artifact id is not hex: {}",
                value
            )));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ArtifactId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_known_digest_lengths() {
        assert!(ArtifactId::parse(&"a".repeat(32)).is_ok());
        assert!(ArtifactId::parse(&"b".repeat(40)).is_ok());
        assert!(ArtifactId::parse(&"0".repeat(64)).is_ok());
    }

    #[test]
    fn parse_normalizes_case() {
        let id = ArtifactId::parse(&"AB".repeat(16)).unwrap();
        assert_eq!(id.as_str(), "ab".repeat(16));
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert!(ArtifactId::parse("not-a-hash").is_err());
        assert!(ArtifactId::parse(&"g".repeat(32)).is_err());
        assert!(ArtifactId::parse(&"a".repeat(33)).is_err());
        assert!(ArtifactId::parse("").is_err());
    }
}
