use std::fmt;

use clap::Args;
use comfy_table::Table;
use owo_colors::OwoColorize;

use common::{DiskError, DiskStats};
use tierfs_daemon::{SetupError, StateError};

#[derive(Args, Debug, Clone)]
pub struct Stats {
    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug)]
pub struct StatsOutput {
    pub stats: DiskStats,
    pub json: bool,
}

impl fmt::Display for StatsOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.json {
            let text = serde_json::to_string_pretty(&self.stats).map_err(|_| fmt::Error)?;
            return write!(f, "{text}");
        }

        let stats = &self.stats;
        let mut table = Table::new();
        table.set_header(vec!["", "FILES", "BYTES"]);
        table.add_row(vec![
            "persistent".to_string(),
            stats.file_count.to_string(),
            stats.used_bytes.to_string(),
        ]);
        table.add_row(vec![
            "buffered".to_string(),
            stats.buffered_files.to_string(),
            stats.buffered_bytes.to_string(),
        ]);
        match &stats.cache {
            Some(cache) => table.add_row(vec![
                "cache".to_string(),
                cache.entries.to_string(),
                format!("{} / {}", cache.size, cache.capacity),
            ]),
            None => table.add_row(vec![
                "cache".to_string(),
                "-".to_string(),
                "disabled".dimmed().to_string(),
            ]),
        };
        write!(f, "{table}")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StatsError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Setup(#[from] SetupError),
    #[error("{0}")]
    Disk(#[from] DiskError),
}

impl crate::cli::op::Op for Stats {
    type Error = StatsError;
    type Output = StatsOutput;

    fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let stats = ctx.with_disk(|disk| Ok::<_, StatsError>(disk.stats()?))?;
        Ok(StatsOutput {
            stats,
            json: self.json,
        })
    }
}
