//! Configuration types for tiktok-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration for the archiver
///
/// Every field has a sensible default, so `Config::default()` works out of
/// the box. Deserialization tolerates missing fields via per-field defaults,
/// which lets old config files keep working after upgrades.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Root directory all archived videos are written under (default: "Downloaded_Videos")
    #[serde(default = "default_output_root")]
    pub output_root: PathBuf,

    /// Maximum concurrent fetches within a batch (default: 3)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Number of items processed per batch (default: 10)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Total download rate budget in bytes per second, shared across all
    /// workers (default: 10 MiB/s)
    #[serde(default = "default_total_rate_bps")]
    pub total_rate_bps: u64,

    /// Minimum total rate the budget is clamped to before division
    /// (default: 1024 bytes/s)
    #[serde(default = "default_rate_floor_bps")]
    pub rate_floor_bps: u64,

    /// Socket timeout passed through to the fetcher, in seconds (default: 30)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retry count passed through to the fetcher (default: 3)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Save sidecar metadata and thumbnails alongside each video (default: true)
    #[serde(default = "default_true")]
    pub save_metadata: bool,

    /// Emit a profile work item when the export contains an account name
    /// (default: true)
    #[serde(default = "default_true")]
    pub include_profile: bool,

    /// Output filename template handed to the fetcher (default: "%(id)s.%(ext)s")
    #[serde(default = "default_output_template")]
    pub output_template: String,

    /// Delay between batches in milliseconds, to avoid bursting the upstream
    /// service (default: 1000)
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,

    /// Polling interval for the pause flag in milliseconds (default: 250)
    #[serde(default = "default_pause_poll_ms")]
    pub pause_poll_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_root: default_output_root(),
            concurrency: default_concurrency(),
            batch_size: default_batch_size(),
            total_rate_bps: default_total_rate_bps(),
            rate_floor_bps: default_rate_floor_bps(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            save_metadata: true,
            include_profile: true,
            output_template: default_output_template(),
            batch_delay_ms: default_batch_delay_ms(),
            pause_poll_ms: default_pause_poll_ms(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    ///
    /// Missing fields fall back to their defaults, so configs written by
    /// older versions load cleanly.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save the current configuration to a JSON file (pretty-printed).
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Validate configuration invariants.
    ///
    /// `concurrency` and `batch_size` must both be at least 1; the rate
    /// budget handles its own clamping and has no invalid values.
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(Error::Config {
                message: "concurrency must be at least 1".to_string(),
                key: Some("concurrency".to_string()),
            });
        }
        if self.batch_size == 0 {
            return Err(Error::Config {
                message: "batch_size must be at least 1".to_string(),
                key: Some("batch_size".to_string()),
            });
        }
        Ok(())
    }
}

fn default_output_root() -> PathBuf {
    PathBuf::from("Downloaded_Videos")
}

fn default_concurrency() -> usize {
    3
}

fn default_batch_size() -> usize {
    10
}

fn default_total_rate_bps() -> u64 {
    10 * 1024 * 1024
}

fn default_rate_floor_bps() -> u64 {
    1024
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_true() -> bool {
    true
}

fn default_output_template() -> String {
    "%(id)s.%(ext)s".to_string()
}

fn default_batch_delay_ms() -> u64 {
    1000
}

fn default_pause_poll_ms() -> u64 {
    250
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.concurrency, 3);
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.output_root, PathBuf::from("Downloaded_Videos"));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let config = Config {
            concurrency: 0,
            ..Config::default()
        };
        let err = config.validate().unwrap_err();
        match err {
            Error::Config { key, .. } => assert_eq!(key.as_deref(), Some("concurrency")),
            other => panic!("expected Config error, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let config = Config {
            batch_size: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("config.json");

        let config = Config {
            concurrency: 5,
            total_rate_bps: 2_000_000,
            save_metadata: false,
            ..Config::default()
        };
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.concurrency, 5);
        assert_eq!(loaded.total_rate_bps, 2_000_000);
        assert!(!loaded.save_metadata);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("config.json");
        std::fs::write(&path, r#"{"concurrency": 8}"#).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.concurrency, 8);
        assert_eq!(loaded.batch_size, 10);
        assert!(loaded.save_metadata);
    }
}
