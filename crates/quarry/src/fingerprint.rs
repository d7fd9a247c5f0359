//! Rule fingerprint computation.

use anyhow::{Context, Result};
use quarry_protocol::RuleFingerprint;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

/// Recognized rule file extensions (matched case-insensitively).
pub const RULE_EXTENSIONS: [&str; 2] = ["yar", "yara"];

/// Enumerate the active rule files in a directory.
///
/// Only regular files with a recognized extension count; nested
/// directories are skipped. Output is sorted so callers see a stable
/// order regardless of directory enumeration.
pub fn rule_files(rule_dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(rule_dir)
        .with_context(|| format!("Failed to read rule directory: {}", rule_dir.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let matches_ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| {
                let lower = e.to_ascii_lowercase();
                RULE_EXTENSIONS.contains(&lower.as_str())
            })
            .unwrap_or(false);
        if matches_ext {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Compute the fingerprint of the current rule set: one SHA-256 per
/// rule file, sorted. Pure apart from the directory reads; adding,
/// removing or modifying any rule file changes the result, reordering
/// files on disk does not.
pub fn compute_fingerprint(rule_dir: &Path) -> Result<RuleFingerprint> {
    let mut hashes = Vec::new();
    for path in rule_files(rule_dir)? {
        let data = fs::read(&path)
            .with_context(|| format!("Failed to read rule file: {}", path.display()))?;
        let mut hasher = Sha256::new();
        hasher.update(&data);
        hashes.push(hex::encode(hasher.finalize()));
    }
    Ok(RuleFingerprint::from_hashes(hashes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_rule(dir: &Path, name: &str, body: &str) {
        fs::write(dir.join(name), body).unwrap();
    }

    #[test]
    fn deterministic_across_calls() {
        let dir = tempfile::tempdir().unwrap();
        write_rule(dir.path(), "a.yar", "rule a { condition: true }");
        write_rule(dir.path(), "b.yara", "rule b { condition: false }");

        let first = compute_fingerprint(dir.path()).unwrap();
        let second = compute_fingerprint(dir.path()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn independent_of_file_names_and_creation_order() {
        let left = tempfile::tempdir().unwrap();
        write_rule(left.path(), "z_last.yar", "rule a { condition: true }");
        write_rule(left.path(), "a_first.yar", "rule b { condition: true }");

        let right = tempfile::tempdir().unwrap();
        write_rule(right.path(), "a_first.yar", "rule a { condition: true }");
        write_rule(right.path(), "z_last.yar", "rule b { condition: true }");

        // Same contents, different file/creation layout
        assert_eq!(
            compute_fingerprint(left.path()).unwrap(),
            compute_fingerprint(right.path()).unwrap()
        );
    }

    #[test]
    fn sensitive_to_single_byte_change() {
        let dir = tempfile::tempdir().unwrap();
        write_rule(dir.path(), "a.yar", "rule a { condition: true }");
        let before = compute_fingerprint(dir.path()).unwrap();

        write_rule(dir.path(), "a.yar", "rule a { condition: false }");
        let after = compute_fingerprint(dir.path()).unwrap();
        assert_ne!(before, after);
    }

    #[test]
    fn skips_non_rule_files_and_directories() {
        let dir = tempfile::tempdir().unwrap();
        write_rule(dir.path(), "a.YAR", "rule a { condition: true }");
        write_rule(dir.path(), "notes.txt", "not a rule");
        fs::create_dir(dir.path().join("nested.yar")).unwrap();

        let fp = compute_fingerprint(dir.path()).unwrap();
        assert_eq!(fp.len(), 1);
    }

    #[test]
    fn empty_directory_yields_empty_fingerprint() {
        let dir = tempfile::tempdir().unwrap();
        let fp = compute_fingerprint(dir.path()).unwrap();
        assert!(fp.is_empty());
    }
}
