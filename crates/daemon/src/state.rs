//! On-disk application state: the config directory and its `config.toml`

use std::path::{Path, PathBuf};

use common::DiskConfig;
use object_store::MirrorConfig;
use serde::{Deserialize, Serialize};

pub const APP_NAME: &str = "tierfs";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const DATA_DIR_NAME: &str = "data";

/// Contents of `config.toml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub disk: DiskConfig,
    /// Remote mirror for the persistent tier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mirror: Option<MirrorConfig>,
}

impl AppConfig {
    /// Defaults with the data partition inside `tierfs_dir`
    pub fn for_dir(tierfs_dir: &Path) -> Self {
        Self {
            disk: DiskConfig::new(tierfs_dir.join(DATA_DIR_NAME)),
            mirror: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    /// Path to the tierfs directory (~/.tierfs)
    pub tierfs_dir: PathBuf,
    pub config_path: PathBuf,
    pub config: AppConfig,
}

impl AppState {
    /// Resolve the tierfs directory, `~/.tierfs` unless overridden
    pub fn tierfs_dir(custom_path: Option<PathBuf>) -> Result<PathBuf, StateError> {
        if let Some(path) = custom_path {
            return Ok(path);
        }
        let home = dirs::home_dir().ok_or(StateError::NoHomeDirectory)?;
        Ok(home.join(format!(".{APP_NAME}")))
    }

    /// Create the tierfs directory, its data partition and `config.toml`.
    ///
    /// Fails if the directory is already initialized.
    pub fn init(
        custom_path: Option<PathBuf>,
        config: Option<AppConfig>,
    ) -> Result<Self, StateError> {
        let tierfs_dir = Self::tierfs_dir(custom_path)?;
        let config_path = tierfs_dir.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            return Err(StateError::AlreadyInitialized(tierfs_dir));
        }

        std::fs::create_dir_all(&tierfs_dir)?;
        let config = config.unwrap_or_else(|| AppConfig::for_dir(&tierfs_dir));
        config.disk.validate()?;
        std::fs::create_dir_all(&config.disk.data_partition)?;

        let text = toml::to_string_pretty(&config)?;
        std::fs::write(&config_path, text)?;

        Ok(Self {
            tierfs_dir,
            config_path,
            config,
        })
    }

    /// Read an initialized tierfs directory
    pub fn load(custom_path: Option<PathBuf>) -> Result<Self, StateError> {
        let tierfs_dir = Self::tierfs_dir(custom_path)?;
        let config_path = tierfs_dir.join(CONFIG_FILE_NAME);
        if !config_path.exists() {
            return Err(StateError::NotInitialized(tierfs_dir));
        }

        let text = std::fs::read_to_string(&config_path)?;
        let mut config: AppConfig = toml::from_str(&text)?;
        // Relative partitions are relative to the tierfs directory
        if config.disk.data_partition.is_relative() {
            config.disk.data_partition = tierfs_dir.join(&config.disk.data_partition);
        }
        config.disk.validate()?;

        Ok(Self {
            tierfs_dir,
            config_path,
            config,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("could not determine home directory")]
    NoHomeDirectory,

    #[error("tierfs is not initialized at {0} (run `tierfs init`)")]
    NotInitialized(PathBuf),

    #[error("tierfs is already initialized at {0}")]
    AlreadyInitialized(PathBuf),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to write config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(#[from] common::ConfigError),
}
