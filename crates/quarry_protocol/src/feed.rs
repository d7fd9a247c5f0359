//! Published feed shapes.
//!
//! Field names match the JSON consumed downstream; do not rename
//! without versioning the feed.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Static feed metadata, written once per feed file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedInfo {
    pub name: String,
    pub display_name: String,
    pub provider_url: String,
    pub summary: String,
    pub tech_data: String,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl Default for FeedInfo {
    fn default() -> Self {
        Self {
            name: "quarry".to_string(),
            display_name: "Quarry".to_string(),
            provider_url: "https://virustotal.github.io/yara/".to_string(),
            summary: "Scan binaries collected from the module store with YARA.".to_string(),
            tech_data: "No data is shared with any third party to use this feed.".to_string(),
            category: "Connectors".to_string(),
            icon: Some("yara-logo.png".to_string()),
        }
    }
}

/// One qualifying record, derived from a stored scan result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedReport {
    pub id: String,
    pub title: String,
    pub description: String,
    /// Unix seconds at feed generation time, not scan time.
    pub timestamp: i64,
    pub link: String,
    pub score: i64,
    /// IOC type -> values, e.g. "sha256" -> [digest].
    pub iocs: BTreeMap<String, Vec<String>>,
}

/// The full published feed: metadata plus the current report set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feed {
    pub feedinfo: FeedInfo,
    pub reports: Vec<FeedReport>,
}

impl Feed {
    pub fn new(feedinfo: FeedInfo, reports: Vec<FeedReport>) -> Self {
        Self { feedinfo, reports }
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_serializes_with_expected_fields() {
        let mut iocs = BTreeMap::new();
        iocs.insert("sha256".to_string(), vec!["ab".repeat(32)]);
        let feed = Feed::new(
            FeedInfo::default(),
            vec![FeedReport {
                id: format!("binary_{}", "ab".repeat(32)),
                title: "matched: silent_banker".to_string(),
                description: "matched: silent_banker".to_string(),
                timestamp: 1_700_000_000,
                link: String::new(),
                score: 10,
                iocs,
            }],
        );

        let json = feed.to_json_pretty().unwrap();
        for field in [
            "feedinfo",
            "reports",
            "\"iocs\"",
            "\"sha256\"",
            "binary_",
            "yara-logo.png",
        ] {
            assert!(json.contains(field), "missing {field} in {json}");
        }
    }
}
