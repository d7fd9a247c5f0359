//! Agent configuration.
//!
//! Loaded from a TOML file named on the command line; every field is
//! validated at load so a bad configuration is caught before any work
//! starts.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

fn default_batch_size() -> usize {
    8
}

fn default_window_days() -> i64 {
    365
}

fn default_yara_binary() -> PathBuf {
    PathBuf::from("yara")
}

/// Where batches execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Local,
    Remote,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Directory holding the active rule files.
    pub rules_dir: PathBuf,
    /// Local blob cache the engine reads artifact bytes from.
    pub blob_dir: PathBuf,
    /// Directory for the record store database.
    pub database_dir: PathBuf,
    /// Published feed file.
    pub feed_output: PathBuf,
    /// Module store connection string (postgres://...).
    pub module_store_url: String,

    #[serde(default)]
    pub mode: Mode,
    /// Maximum identifiers per dispatched batch.
    #[serde(default = "default_batch_size")]
    pub max_batch_size: usize,
    /// Scan-once override: never rescan a record that already has a
    /// stored fingerprint, even after rule changes.
    #[serde(default)]
    pub disable_rescan: bool,
    /// Only artifacts seen within this many days are enumerated.
    #[serde(default = "default_window_days")]
    pub artifact_window_days: i64,

    /// Optional maintenance command, run every
    /// `maintenance_interval_secs` of loop time. Zero disables it.
    #[serde(default)]
    pub maintenance_script: Option<String>,
    #[serde(default)]
    pub maintenance_interval_secs: u64,

    #[serde(default = "default_yara_binary")]
    pub yara_binary: PathBuf,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !self.rules_dir.is_dir() {
            bail!("rules_dir is not a directory: {}", self.rules_dir.display());
        }
        if self.max_batch_size == 0 {
            bail!("max_batch_size must be at least 1");
        }
        if self.artifact_window_days <= 0 {
            bail!("artifact_window_days must be positive");
        }
        if self.maintenance_interval_secs > 0 && self.maintenance_script.is_none() {
            bail!("maintenance_interval_secs is set but maintenance_script is missing");
        }
        if !self.module_store_url.starts_with("postgres://")
            && !self.module_store_url.starts_with("postgresql://")
        {
            bail!("module_store_url must be a postgres:// URL");
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.database_dir.join("records.sqlite3")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn minimal_toml(rules_dir: &Path) -> String {
        format!(
            r#"
rules_dir = "{rules}"
blob_dir = "/var/quarry/blobs"
database_dir = "/var/quarry/db"
feed_output = "/var/quarry/feed.json"
module_store_url = "postgres://cb@localhost/cb"
"#,
            rules = rules_dir.display()
        )
    }

    fn load_from_str(body: &str) -> Result<Config> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.toml");
        fs::write(&path, body).unwrap();
        Config::load(&path)
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let rules = tempfile::tempdir().unwrap();
        let config = load_from_str(&minimal_toml(rules.path())).unwrap();
        assert_eq!(config.mode, Mode::Local);
        assert_eq!(config.max_batch_size, 8);
        assert_eq!(config.artifact_window_days, 365);
        assert!(!config.disable_rescan);
        assert_eq!(config.maintenance_interval_secs, 0);
        assert_eq!(config.yara_binary, PathBuf::from("yara"));
    }

    #[test]
    fn remote_mode_parses() {
        let rules = tempfile::tempdir().unwrap();
        let body = format!("{}\nmode = \"remote\"\n", minimal_toml(rules.path()));
        let config = load_from_str(&body).unwrap();
        assert_eq!(config.mode, Mode::Remote);
    }

    #[test]
    fn rejects_missing_rules_dir() {
        let err = load_from_str(&minimal_toml(Path::new("/does/not/exist"))).unwrap_err();
        assert!(err.to_string().contains("rules_dir"));
    }

    #[test]
    fn rejects_zero_batch_size() {
        let rules = tempfile::tempdir().unwrap();
        let body = format!("{}\nmax_batch_size = 0\n", minimal_toml(rules.path()));
        assert!(load_from_str(&body).is_err());
    }

    #[test]
    fn rejects_maintenance_interval_without_script() {
        let rules = tempfile::tempdir().unwrap();
        let body = format!(
            "{}\nmaintenance_interval_secs = 3600\n",
            minimal_toml(rules.path())
        );
        assert!(load_from_str(&body).is_err());
    }

    #[test]
    fn rejects_non_postgres_store_url() {
        let rules = tempfile::tempdir().unwrap();
        let body = minimal_toml(rules.path()).replace("postgres://cb@localhost/cb", "mysql://x");
        assert!(load_from_str(&body).is_err());
    }
}
