//! Virtual disk configuration

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};

/// Default cache capacity (64MB)
pub const DEFAULT_CACHE_SIZE: u64 = 64 * 1024 * 1024;
/// Default advisory limit for the in-memory tier (256MB)
pub const DEFAULT_BUFFER_SIZE: u64 = 256 * 1024 * 1024;
/// Default lifetime of ephemeral files
pub const DEFAULT_TEMP_TTL: Duration = Duration::from_secs(60 * 60);

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiskConfig {
    /// Root directory of the persistent tier
    pub data_partition: PathBuf,
    /// Soft limit on bytes held by the in-memory tier; exceeding it only warns
    pub buffer_size: u64,
    /// Route `temp/` paths to the ephemeral tier
    pub enable_temp: bool,
    /// Route `mem/` paths to the in-memory tier
    pub enable_memory: bool,
    /// Cache capacity in bytes; zero disables the cache
    pub cache_size: u64,
    /// Age after which ephemeral files are swept; zero disables the sweep
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "temp_ttl_ms")]
    pub temp_ttl: Duration,
}

impl Default for DiskConfig {
    fn default() -> Self {
        Self {
            data_partition: PathBuf::from("data"),
            buffer_size: DEFAULT_BUFFER_SIZE,
            enable_temp: true,
            enable_memory: true,
            cache_size: DEFAULT_CACHE_SIZE,
            temp_ttl: DEFAULT_TEMP_TTL,
        }
    }
}

impl DiskConfig {
    /// Config rooted at `data_partition` with every other field defaulted
    pub fn new(data_partition: impl Into<PathBuf>) -> Self {
        Self {
            data_partition: data_partition.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.data_partition.as_os_str().is_empty() {
            return Err(ConfigError::MissingDataPartition);
        }
        Ok(())
    }

    /// Interval between sweep passes, if the sweep should run at all
    pub fn sweep_interval(&self) -> Option<Duration> {
        if !self.enable_temp || self.temp_ttl.is_zero() {
            return None;
        }
        Some((self.temp_ttl / 2).max(Duration::from_millis(1)))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("data partition path is empty")]
    MissingDataPartition,
}
