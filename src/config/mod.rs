//! Sync core configuration

use crate::infrastructure::retry::RetryPolicy;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

/// Retention windows and pull limits for the sync core
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Events older than this are archived once every active device acked them
    pub archive_after_days: i64,

    /// Events older than this are archived regardless of acknowledgments
    pub force_archive_after_days: i64,

    /// Archived events are purged this long after their archive date
    pub purge_after_days: i64,

    /// Devices silent for this long are soft-deactivated
    pub deactivate_after_days: i64,

    /// Window defining which devices count as active for the archive gate
    pub active_window_days: i64,

    /// Pull batch size when the caller does not ask for one
    pub default_pull_limit: u64,

    /// Hard cap on pull batch size
    pub max_pull_limit: u64,

    /// Retry policy for transient store failures
    pub retry: RetryPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            archive_after_days: 7,
            force_archive_after_days: 30,
            purge_after_days: 90,
            deactivate_after_days: 30,
            active_window_days: 7,
            default_pull_limit: 100,
            max_pull_limit: 500,
            retry: RetryPolicy::default(),
        }
    }
}

impl SyncConfig {
    /// Load configuration from a data directory, creating defaults if absent
    pub fn load_from(data_dir: &PathBuf) -> Result<Self> {
        let config_path = data_dir.join("smartsync.json");

        if config_path.exists() {
            info!("Loading sync config from {:?}", config_path);
            let json = fs::read_to_string(&config_path)?;
            let config: SyncConfig = serde_json::from_str(&json)?;
            Ok(config)
        } else {
            warn!("No sync config found, creating default at {:?}", config_path);
            let config = Self::default();
            config.save(data_dir)?;
            Ok(config)
        }
    }

    /// Save configuration to a data directory
    pub fn save(&self, data_dir: &PathBuf) -> Result<()> {
        fs::create_dir_all(data_dir)?;

        let config_path = data_dir.join("smartsync.json");
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&config_path, json)?;
        info!("Saved sync config to {:?}", config_path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_round_trip_through_disk() {
        let dir = TempDir::new().unwrap();
        let data_dir = dir.path().to_path_buf();

        let written = SyncConfig::load_from(&data_dir).unwrap();
        assert_eq!(written.archive_after_days, 7);
        assert_eq!(written.max_pull_limit, 500);

        let reread = SyncConfig::load_from(&data_dir).unwrap();
        assert_eq!(reread.purge_after_days, written.purge_after_days);
        assert_eq!(reread.retry.initial_backoff_ms, 300);
    }
}
