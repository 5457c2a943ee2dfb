use std::fmt;
use std::io::Read;
use std::path::PathBuf;

use clap::Args;
use owo_colors::OwoColorize;

use common::{DiskError, StorageTier};
use tierfs_daemon::{SetupError, StateError};

#[derive(Args, Debug, Clone)]
pub struct Put {
    /// Logical path to write, e.g. `docs/a.txt`, `temp/x` or `mem/y`
    pub path: String,

    /// Local file to upload, `-` for stdin
    pub source: PathBuf,
}

#[derive(Debug)]
pub struct PutOutput {
    pub path: String,
    pub size: usize,
    pub tier: StorageTier,
}

impl fmt::Display for PutOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({} bytes, {} tier)",
            "Wrote".green().bold(),
            self.path.bold(),
            self.size,
            self.tier
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PutError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Setup(#[from] SetupError),
    #[error("{0}")]
    Disk(#[from] DiskError),
    #[error("failed to read {path}: {source}")]
    Source {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl Put {
    fn read_source(&self) -> Result<Vec<u8>, PutError> {
        let result = if self.source.as_os_str() == "-" {
            let mut data = Vec::new();
            std::io::stdin().read_to_end(&mut data).map(|_| data)
        } else {
            std::fs::read(&self.source)
        };
        result.map_err(|source| PutError::Source {
            path: self.source.clone(),
            source,
        })
    }
}

impl crate::cli::op::Op for Put {
    type Error = PutError;
    type Output = PutOutput;

    fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let data = self.read_source()?;
        let size = data.len();

        ctx.with_disk(|disk| {
            let tier = disk.tier_of(&self.path)?;
            disk.write_file(&self.path, data)?;
            Ok(PutOutput {
                path: self.path.clone(),
                size,
                tier,
            })
        })
    }
}
