use std::fmt;

use clap::Args;
use comfy_table::Table;

use common::{DiskError, FileInfo};
use tierfs_daemon::{SetupError, StateError};

#[derive(Args, Debug, Clone)]
pub struct Ls {
    /// Only list paths starting with this prefix
    #[arg(default_value = "")]
    pub prefix: String,

    /// Include directories, with size and modification time
    #[arg(long)]
    pub dirs: bool,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug)]
pub enum LsItems {
    Paths(Vec<String>),
    Detailed(Vec<FileInfo>),
}

#[derive(Debug)]
pub struct LsOutput {
    pub items: LsItems,
    pub json: bool,
}

impl LsOutput {
    fn is_empty(&self) -> bool {
        match &self.items {
            LsItems::Paths(paths) => paths.is_empty(),
            LsItems::Detailed(items) => items.is_empty(),
        }
    }
}

impl fmt::Display for LsOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.json {
            let text = match &self.items {
                LsItems::Paths(paths) => serde_json::to_string_pretty(paths),
                LsItems::Detailed(items) => serde_json::to_string_pretty(items),
            }
            .map_err(|_| fmt::Error)?;
            return write!(f, "{text}");
        }

        if self.is_empty() {
            return write!(f, "No items found");
        }

        match &self.items {
            LsItems::Paths(paths) => write!(f, "{}", paths.join("\n")),
            LsItems::Detailed(items) => {
                let mut table = Table::new();
                table.set_header(vec!["TYPE", "PATH", "SIZE", "MODIFIED"]);
                for item in items {
                    let type_str = if item.is_dir { "dir" } else { "file" };
                    table.add_row(vec![
                        type_str.to_string(),
                        item.path.clone(),
                        item.size.to_string(),
                        item.modified.format("%Y-%m-%d %H:%M:%S").to_string(),
                    ]);
                }
                write!(f, "{table}")
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LsError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Setup(#[from] SetupError),
    #[error("{0}")]
    Disk(#[from] DiskError),
}

impl crate::cli::op::Op for Ls {
    type Error = LsError;
    type Output = LsOutput;

    fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let items = ctx.with_disk(|disk| {
            let items = if self.dirs {
                LsItems::Detailed(disk.list_files_and_dirs(&self.prefix)?)
            } else {
                LsItems::Paths(disk.list_files(&self.prefix)?)
            };
            Ok::<_, LsError>(items)
        })?;

        Ok(LsOutput {
            items,
            json: self.json,
        })
    }
}
