use std::fmt;

use clap::Args;
use owo_colors::OwoColorize;

use common::DiskError;
use tierfs_daemon::{SetupError, StateError};

#[derive(Args, Debug, Clone)]
pub struct Mkdir {
    /// Directory to create, parents included
    pub path: String,
}

#[derive(Debug)]
pub struct MkdirOutput {
    pub path: String,
}

impl fmt::Display for MkdirOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", "Created".green().bold(), self.path.bold())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MkdirError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Setup(#[from] SetupError),
    #[error("{0}")]
    Disk(#[from] DiskError),
}

impl crate::cli::op::Op for Mkdir {
    type Error = MkdirError;
    type Output = MkdirOutput;

    fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        ctx.with_disk(|disk| Ok::<_, MkdirError>(disk.create_directory(&self.path)?))?;
        Ok(MkdirOutput {
            path: self.path.clone(),
        })
    }
}
