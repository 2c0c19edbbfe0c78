//! Configuration for screening

use crate::error::{Result, ScreeningError};
use crate::screening::ScreeningPolicy;
use crate::snapshot::DirectorySnapshot;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Screening configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreeningConfig {
    /// Root of the snapshot cache (`snapshots/` and `LATEST` live here)
    pub cache_dir: PathBuf,

    /// Ranking and decision thresholds
    pub policy: ScreeningPolicy,
}

impl Default for ScreeningConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("./.sanctions"),
            policy: ScreeningPolicy::default(),
        }
    }
}

impl ScreeningConfig {
    /// Load from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ScreeningConfig = toml::from_str(&content)
            .map_err(|e| ScreeningError::ConfigError(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = ScreeningConfig::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Overlay `SANCTIONS_*` values from `lookup` onto this config
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(cache_dir) = lookup("SANCTIONS_CACHE_DIR") {
            self.cache_dir = PathBuf::from(cache_dir);
        }

        if let Some(top_k) = lookup("SANCTIONS_TOP_K") {
            self.policy.top_k = parse_var("SANCTIONS_TOP_K", &top_k)?;
        }

        if let Some(review) = lookup("SANCTIONS_REVIEW_THRESHOLD") {
            self.policy.review_threshold = parse_var("SANCTIONS_REVIEW_THRESHOLD", &review)?;
        }

        if let Some(block) = lookup("SANCTIONS_BLOCK_THRESHOLD") {
            self.policy.block_threshold = parse_var("SANCTIONS_BLOCK_THRESHOLD", &block)?;
        }

        Ok(())
    }

    /// Open the newest snapshot under `cache_dir`
    pub fn latest_snapshot(&self) -> Result<DirectorySnapshot> {
        DirectorySnapshot::open_latest(&self.cache_dir)
    }

    pub fn snapshot(&self, snapshot_id: &str) -> Result<DirectorySnapshot> {
        DirectorySnapshot::open(&self.cache_dir, snapshot_id)
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ScreeningError::ConfigError(format!("Invalid {}: {:?}", key, value)))
}
