use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, ValueEnum};
use owo_colors::OwoColorize;

use object_store::MirrorConfig;
use tierfs_daemon::state::{AppConfig, AppState};

/// Remote mirror backend for CLI selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum MirrorType {
    /// No mirror (default)
    #[default]
    None,
    /// A local directory
    Local,
    /// S3-compatible object storage
    S3,
}

#[derive(Args, Debug, Clone)]
pub struct Init {
    /// Persistent tier root (default: <tierfs dir>/data)
    #[arg(long)]
    pub data_partition: Option<PathBuf>,

    /// Cache capacity in bytes, 0 disables the cache
    #[arg(long)]
    pub cache_size: Option<u64>,

    /// Soft limit in bytes for the in-memory tier
    #[arg(long)]
    pub buffer_size: Option<u64>,

    /// Lifetime of `temp/` files in milliseconds, 0 disables expiry
    #[arg(long)]
    pub temp_ttl_ms: Option<u64>,

    /// Store `temp/` paths in the persistent tier
    #[arg(long)]
    pub no_temp: bool,

    /// Store `mem/` paths in the persistent tier
    #[arg(long)]
    pub no_memory: bool,

    /// Remote mirror backend
    #[arg(long, value_enum, default_value_t = MirrorType::None)]
    pub mirror: MirrorType,

    /// S3/MinIO URL (required for --mirror s3)
    /// Format: s3://access_key:secret_key@host:port/bucket[/prefix]
    #[arg(long)]
    pub s3_url: Option<String>,

    /// Mirror directory (required for --mirror local), must be absolute
    #[arg(long)]
    pub mirror_path: Option<PathBuf>,

    /// Key prefix for --mirror local
    #[arg(long, default_value = "")]
    pub mirror_prefix: String,
}

#[derive(Debug)]
pub struct InitOutput {
    pub tierfs_dir: PathBuf,
    pub config_path: PathBuf,
    pub data_partition: PathBuf,
    pub cache_size: u64,
    pub temp_ttl: Duration,
    pub enable_temp: bool,
    pub enable_memory: bool,
    pub mirror: String,
}

impl fmt::Display for InitOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let on_off = |enabled: bool| if enabled { "enabled" } else { "disabled" };
        writeln!(
            f,
            "{} tierfs at {}",
            "Initialized".green().bold(),
            self.tierfs_dir.display().to_string().bold()
        )?;
        writeln!(f, "  {} {}", "Config:".dimmed(), self.config_path.display())?;
        writeln!(f, "  {} {}", "Data:".dimmed(), self.data_partition.display())?;
        writeln!(f, "  {} {} bytes", "Cache:".dimmed(), self.cache_size)?;
        writeln!(
            f,
            "  {} {} (ttl {} ms)",
            "temp/:".dimmed(),
            on_off(self.enable_temp),
            self.temp_ttl.as_millis()
        )?;
        writeln!(f, "  {} {}", "mem/:".dimmed(), on_off(self.enable_memory))?;
        write!(f, "  {} {}", "Mirror:".dimmed(), self.mirror)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("init failed: {0}")]
    StateFailed(#[from] tierfs_daemon::state::StateError),

    #[error("invalid mirror config: {0}")]
    Mirror(#[from] object_store::SetupError),

    #[error("missing required config: {0}")]
    MissingConfig(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),
}

impl Init {
    fn build_mirror_config(&self) -> Result<Option<MirrorConfig>, InitError> {
        match self.mirror {
            MirrorType::None => Ok(None),

            MirrorType::Local => {
                let path = self.mirror_path.clone().ok_or_else(|| {
                    InitError::MissingConfig("--mirror-path required for local mirror".to_string())
                })?;
                if !path.is_absolute() {
                    return Err(InitError::InvalidPath(
                        "--mirror-path must be an absolute path".to_string(),
                    ));
                }
                Ok(Some(MirrorConfig::Local {
                    path,
                    prefix: self.mirror_prefix.clone(),
                }))
            }

            MirrorType::S3 => {
                let url = self.s3_url.as_deref().ok_or_else(|| {
                    InitError::MissingConfig("--s3-url required for S3 mirror".to_string())
                })?;
                Ok(Some(MirrorConfig::parse_s3_url(url)?))
            }
        }
    }

    fn build_config(&self, tierfs_dir: &std::path::Path) -> Result<AppConfig, InitError> {
        let mut config = AppConfig::for_dir(tierfs_dir);
        if let Some(data_partition) = &self.data_partition {
            config.disk.data_partition = data_partition.clone();
        }
        if let Some(cache_size) = self.cache_size {
            config.disk.cache_size = cache_size;
        }
        if let Some(buffer_size) = self.buffer_size {
            config.disk.buffer_size = buffer_size;
        }
        if let Some(ttl) = self.temp_ttl_ms {
            config.disk.temp_ttl = Duration::from_millis(ttl);
        }
        config.disk.enable_temp = !self.no_temp;
        config.disk.enable_memory = !self.no_memory;
        config.mirror = self.build_mirror_config()?;
        Ok(config)
    }
}

impl crate::cli::op::Op for Init {
    type Error = InitError;
    type Output = InitOutput;

    fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let tierfs_dir = AppState::tierfs_dir(ctx.config_path.clone())?;
        let config = self.build_config(&tierfs_dir)?;

        let state = AppState::init(ctx.config_path.clone(), Some(config))?;
        let disk = &state.config.disk;

        Ok(InitOutput {
            tierfs_dir: state.tierfs_dir.clone(),
            config_path: state.config_path.clone(),
            data_partition: disk.data_partition.clone(),
            cache_size: disk.cache_size,
            temp_ttl: disk.temp_ttl,
            enable_temp: disk.enable_temp,
            enable_memory: disk.enable_memory,
            mirror: state
                .config
                .mirror
                .as_ref()
                .map_or_else(|| "none".to_string(), MirrorConfig::describe),
        })
    }
}
