//! Builder configuration stored at `reports.toml` in the repo root.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Report builder configuration (TOML).
///
/// Missing fields default to sensible values; a missing file means all
/// defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReportsConfig {
    /// Directory the site is rendered into, relative to the repo root.
    pub output_dir: String,

    /// Wall-clock budget for each child command in seconds.
    pub command_timeout_secs: u64,

    /// Truncate captured stdout/stderr beyond this many bytes.
    pub output_limit_bytes: usize,
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            output_dir: "target/reports".to_string(),
            command_timeout_secs: 15 * 60,
            output_limit_bytes: 400_000,
        }
    }
}

impl ReportsConfig {
    pub fn validate(&self) -> Result<()> {
        if self.output_dir.trim().is_empty() {
            return Err(anyhow!("output_dir must be non-empty"));
        }
        if self.command_timeout_secs == 0 {
            return Err(anyhow!("command_timeout_secs must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `ReportsConfig::default()`.
pub fn load_config(path: &Path) -> Result<ReportsConfig> {
    if !path.exists() {
        let cfg = ReportsConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: ReportsConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, ReportsConfig::default());
    }

    #[test]
    fn load_fills_missing_fields_from_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("reports.toml");
        fs::write(&path, "output_dir = \"site\"\n").expect("write");

        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.output_dir, "site");
        assert_eq!(
            cfg.command_timeout_secs,
            ReportsConfig::default().command_timeout_secs
        );
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("reports.toml");
        fs::write(&path, "command_timeout_secs = 0\n").expect("write");
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn blank_output_dir_is_rejected() {
        let cfg = ReportsConfig {
            output_dir: "  ".to_string(),
            ..ReportsConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
