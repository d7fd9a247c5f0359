//! Local YARA engine: shells out to the `yara` binary.
//!
//! Artifact bytes are read from a local blob directory keyed by
//! content hash, and each artifact is scanned in a single pass with
//! the full rule set. An artifact whose blob is missing is reported as
//! unavailable, not as an error.

use crate::engine::{EngineError, ScanEngine};
use crate::fingerprint::rule_files;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use quarry_protocol::{AnalysisResult, ArtifactId};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

/// Score granted per matched rule, capped at `MAX_SCORE`.
const SCORE_PER_MATCH: i64 = 10;
const MAX_SCORE: i64 = 100;

pub struct YaraCliEngine {
    binary: PathBuf,
    rule_paths: Vec<PathBuf>,
    blob_dir: PathBuf,
}

impl YaraCliEngine {
    /// Snapshot the rule directory once; the rule set is immutable for
    /// the lifetime of the engine, matching the fingerprint captured
    /// at startup.
    pub fn new(binary: impl Into<PathBuf>, rule_dir: &Path, blob_dir: impl Into<PathBuf>) -> Result<Self> {
        let rule_paths = rule_files(rule_dir)?;
        Ok(Self {
            binary: binary.into(),
            rule_paths,
            blob_dir: blob_dir.into(),
        })
    }

    pub fn rule_count(&self) -> usize {
        self.rule_paths.len()
    }

    fn blob_path(&self, id: &ArtifactId) -> PathBuf {
        self.blob_dir.join(id.as_str())
    }
}

#[async_trait]
impl ScanEngine for YaraCliEngine {
    async fn analyze(&self, id: &ArtifactId) -> Result<AnalysisResult, EngineError> {
        let target = self.blob_path(id);
        if !target.is_file() {
            debug!(artifact = %id, "Artifact blob not present locally");
            return Ok(AnalysisResult::unavailable(id.clone()));
        }
        if self.rule_paths.is_empty() {
            return Ok(AnalysisResult::scanned(id.clone(), 0, "", ""));
        }

        // One engine invocation per artifact with the full rule set
        let output = Command::new(&self.binary)
            .args(&self.rule_paths)
            .arg(&target)
            .output()
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Ok(AnalysisResult::engine_error(
                id.clone(),
                format!("engine exited with {}: {}", output.status, stderr.trim()),
            ));
        }

        let mut matched = parse_matches(&stdout);
        matched.sort();
        matched.dedup();

        let score = (matched.len() as i64 * SCORE_PER_MATCH).min(MAX_SCORE);
        let short_result = if matched.is_empty() {
            String::new()
        } else {
            format!("matched: {}", matched.join(", "))
        };
        Ok(AnalysisResult::scanned(
            id.clone(),
            score,
            short_result,
            stdout.trim(),
        ))
    }
}

/// Extract matched rule names from `yara` stdout.
///
/// Match lines look like `rule_name [tags] /path/to/target`; string
/// detail lines (with `-s`) start with a hex offset and are ignored.
pub fn parse_matches(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter(|line| !line.is_empty() && !line.starts_with("0x"))
        .filter_map(|line| line.split_whitespace().next())
        .map(|name| name.to_string())
        .collect()
}

/// Compile-check every rule file by running the engine against an
/// empty target. Any rule that fails to compile fails the whole set.
pub async fn validate_rules(binary: &Path, rule_dir: &Path) -> Result<()> {
    let rules = rule_files(rule_dir)?;
    if rules.is_empty() {
        bail!("No rule files found in {}", rule_dir.display());
    }

    let target = tempfile::NamedTempFile::new().context("Failed to create validation target")?;
    let mut failures = Vec::new();

    for rule in &rules {
        let output = Command::new(binary)
            .arg(rule)
            .arg(target.path())
            .output()
            .await
            .with_context(|| format!("Failed to run {}", binary.display()))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            failures.push(format!("{}: {}", rule.display(), stderr.trim()));
        }
    }

    if !failures.is_empty() {
        bail!("Rule compilation failed:\n{}", failures.join("\n"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn parse_matches_extracts_rule_names() {
        let stdout = "silent_banker /tmp/blob\n0x40:$a: evil\npacker_upx /tmp/blob\n";
        assert_eq!(parse_matches(stdout), vec!["silent_banker", "packer_upx"]);
    }

    #[test]
    fn parse_matches_handles_empty_output() {
        assert!(parse_matches("").is_empty());
    }

    #[tokio::test]
    async fn missing_blob_reports_unavailable() {
        let rules = tempfile::tempdir().unwrap();
        let blobs = tempfile::tempdir().unwrap();
        let engine = YaraCliEngine::new("yara", rules.path(), blobs.path()).unwrap();

        let id = ArtifactId::parse(&"cd".repeat(32)).unwrap();
        let result = engine.analyze(&id).await.unwrap();
        assert!(result.is_unavailable());
    }

    #[tokio::test]
    async fn empty_rule_set_scores_zero() {
        let rules = tempfile::tempdir().unwrap();
        let blobs = tempfile::tempdir().unwrap();
        let id = ArtifactId::parse(&"cd".repeat(32)).unwrap();
        fs::write(blobs.path().join(id.as_str()), b"payload").unwrap();

        let engine = YaraCliEngine::new("yara", rules.path(), blobs.path()).unwrap();
        assert_eq!(engine.rule_count(), 0);
        let result = engine.analyze(&id).await.unwrap();
        assert_eq!(result.score(), 0);
    }

    #[tokio::test]
    async fn validate_rules_rejects_empty_directory() {
        let rules = tempfile::tempdir().unwrap();
        assert!(validate_rules(Path::new("yara"), rules.path())
            .await
            .is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn scans_whole_rule_set_in_one_invocation() {
        use std::os::unix::fs::PermissionsExt;

        // Stand-in engine binary that logs each invocation and reports
        // one match.
        let bin_dir = tempfile::tempdir().unwrap();
        let binary = bin_dir.path().join("fake-engine");
        let call_log = bin_dir.path().join("calls.log");
        fs::write(
            &binary,
            format!(
                "#!/bin/sh\necho run >> {}\necho fake_rule \"$2\"\n",
                call_log.display()
            ),
        )
        .unwrap();
        fs::set_permissions(&binary, fs::Permissions::from_mode(0o755)).unwrap();

        let rules = tempfile::tempdir().unwrap();
        fs::write(rules.path().join("a.yar"), "rule a { condition: true }").unwrap();
        fs::write(rules.path().join("b.yar"), "rule b { condition: true }").unwrap();

        let blobs = tempfile::tempdir().unwrap();
        let id = ArtifactId::parse(&"ef".repeat(32)).unwrap();
        fs::write(blobs.path().join(id.as_str()), b"payload").unwrap();

        let engine = YaraCliEngine::new(&binary, rules.path(), blobs.path()).unwrap();
        assert_eq!(engine.rule_count(), 2);
        let result = engine.analyze(&id).await.unwrap();

        assert_eq!(result.score(), 10);
        let calls = fs::read_to_string(&call_log).unwrap();
        assert_eq!(calls.lines().count(), 1, "expected a single engine run");
    }
}
