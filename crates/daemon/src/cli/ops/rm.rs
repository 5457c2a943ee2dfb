use std::fmt;

use clap::Args;
use owo_colors::OwoColorize;

use common::DiskError;
use tierfs_daemon::{SetupError, StateError};

#[derive(Args, Debug, Clone)]
pub struct Rm {
    /// Logical path to delete; deleting a missing path succeeds
    pub path: String,
}

#[derive(Debug)]
pub struct RmOutput {
    pub path: String,
}

impl fmt::Display for RmOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", "Removed".green().bold(), self.path.bold())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RmError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Setup(#[from] SetupError),
    #[error("{0}")]
    Disk(#[from] DiskError),
}

impl crate::cli::op::Op for Rm {
    type Error = RmError;
    type Output = RmOutput;

    fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        ctx.with_disk(|disk| Ok::<_, RmError>(disk.delete_file(&self.path)?))?;
        Ok(RmOutput {
            path: self.path.clone(),
        })
    }
}
