use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::error::Result;

/// A listed file or directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub path: String,
    pub is_dir: bool,
    /// Size in bytes, zero for directories
    pub size: u64,
    pub modified: DateTime<Utc>,
}

/// Walk `root` and report everything below it, keyed by logical path.
///
/// The root itself is skipped. With `include_dirs` unset only regular files
/// are reported.
pub(crate) fn walk(root: &Path, include_dirs: bool) -> Result<Vec<FileInfo>> {
    let mut items = Vec::new();
    if !root.exists() {
        return Ok(items);
    }

    for entry in WalkDir::new(root).min_depth(1).follow_links(false) {
        let entry = entry?;
        let is_dir = entry.file_type().is_dir();
        if is_dir && !include_dirs {
            continue;
        }
        if !is_dir && !entry.file_type().is_file() {
            continue;
        }

        let Some(path) = logical_path(root, entry.path()) else {
            continue;
        };
        let metadata = entry.metadata()?;
        let modified = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        items.push(FileInfo {
            path,
            is_dir,
            size: if is_dir { 0 } else { metadata.len() },
            modified,
        });
    }

    Ok(items)
}

/// `path` relative to `root`, with `/` separators
pub(crate) fn logical_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let segments: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if segments.is_empty() {
        return None;
    }
    Some(segments.join("/"))
}
