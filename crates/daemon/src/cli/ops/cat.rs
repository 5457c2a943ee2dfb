use std::fmt;

use clap::Args;
use owo_colors::OwoColorize;

use common::DiskError;
use tierfs_daemon::{SetupError, StateError};

#[derive(Args, Debug, Clone)]
pub struct Cat {
    /// Logical path to read
    pub path: String,
}

#[derive(Debug)]
pub enum CatContent {
    Text(String),
    Binary(Vec<u8>),
}

#[derive(Debug)]
pub struct CatOutput {
    pub path: String,
    pub size: usize,
    pub content: CatContent,
}

impl fmt::Display for CatOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} {}  {} {} bytes",
            "File:".dimmed(),
            self.path.bold(),
            "Size:".dimmed(),
            self.size
        )?;
        match &self.content {
            CatContent::Text(text) => write!(f, "{text}"),
            CatContent::Binary(bytes) => {
                let hex = bytes
                    .iter()
                    .map(|b| format!("{:02x}", b))
                    .collect::<Vec<_>>()
                    .join(" ");
                write!(f, "{} {hex}", "Binary content (hex):".dimmed())
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Setup(#[from] SetupError),
    #[error("{0}")]
    Disk(#[from] DiskError),
}

impl crate::cli::op::Op for Cat {
    type Error = CatError;
    type Output = CatOutput;

    fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let data = ctx.with_disk(|disk| Ok::<_, CatError>(disk.read_file(&self.path)?))?;
        let bytes = data.to_vec();

        let content = match String::from_utf8(bytes.clone()) {
            Ok(text) => CatContent::Text(text),
            Err(_) => CatContent::Binary(bytes),
        };

        Ok(CatOutput {
            path: self.path.clone(),
            size: data.len(),
            content,
        })
    }
}
