//! Storage tiers and the path rules that select them

use std::fmt;

use serde::{Deserialize, Serialize};

/// Namespace prefix routed to the ephemeral tier
pub const TEMP_PREFIX: &str = "temp/";
/// Namespace prefix routed to the in-memory tier
pub const MEMORY_PREFIX: &str = "mem/";

/// Where a file's bytes live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageTier {
    /// Under the data partition, mirrored remotely when a mirror is set
    Persistent,
    /// Under a process-local scratch directory, expired by the sweep
    Ephemeral,
    /// Only in the buffer table
    InMemory,
}

impl StorageTier {
    /// Classify a normalized path.
    ///
    /// A prefix whose tier is disabled falls through to the next rule, and
    /// everything unmatched is persistent.
    pub fn classify(path: &str, enable_temp: bool, enable_memory: bool) -> Self {
        if enable_temp && path.starts_with(TEMP_PREFIX) {
            return StorageTier::Ephemeral;
        }
        if enable_memory && path.starts_with(MEMORY_PREFIX) {
            return StorageTier::InMemory;
        }
        StorageTier::Persistent
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StorageTier::Persistent => "persistent",
            StorageTier::Ephemeral => "ephemeral",
            StorageTier::InMemory => "memory",
        }
    }
}

impl fmt::Display for StorageTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether a cache key belongs to a namespace that is never written back
/// to the data partition, regardless of which tiers are enabled
pub fn is_volatile_key(key: &str) -> bool {
    key.starts_with(TEMP_PREFIX) || key.starts_with(MEMORY_PREFIX)
}

/// Normalize a logical path.
///
/// Leading slashes, empty segments and `.` segments are dropped. `..` is
/// rejected. The root normalizes to the empty string.
pub fn normalize_path(path: &str) -> Result<String, InvalidPath> {
    let mut segments = Vec::new();
    for segment in path.trim().split(['/', '\\']) {
        match segment {
            "" | "." => continue,
            ".." => return Err(InvalidPath(path.to_string())),
            segment => segments.push(segment),
        }
    }
    Ok(segments.join("/"))
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid path: {0}")]
pub struct InvalidPath(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_with_all_tiers() {
        assert_eq!(
            StorageTier::classify("temp/a", true, true),
            StorageTier::Ephemeral
        );
        assert_eq!(
            StorageTier::classify("mem/a", true, true),
            StorageTier::InMemory
        );
        assert_eq!(
            StorageTier::classify("docs/a", true, true),
            StorageTier::Persistent
        );
        // Only a full segment prefix counts
        assert_eq!(
            StorageTier::classify("temporary/a", true, true),
            StorageTier::Persistent
        );
        assert_eq!(
            StorageTier::classify("memo.txt", true, true),
            StorageTier::Persistent
        );
    }

    #[test]
    fn test_disabled_tiers_fall_back_to_persistent() {
        assert_eq!(
            StorageTier::classify("temp/a", false, true),
            StorageTier::Persistent
        );
        assert_eq!(
            StorageTier::classify("mem/a", true, false),
            StorageTier::Persistent
        );
    }

    #[test]
    fn test_volatile_keys() {
        assert!(is_volatile_key("temp/x"));
        assert!(is_volatile_key("mem/x"));
        assert!(!is_volatile_key("data/temp/x"));
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("a.txt").unwrap(), "a.txt");
        assert_eq!(normalize_path("/a/b.txt").unwrap(), "a/b.txt");
        assert_eq!(normalize_path("a//./b/").unwrap(), "a/b");
        assert_eq!(normalize_path("/").unwrap(), "");
        assert_eq!(normalize_path(".").unwrap(), "");
        assert_eq!(normalize_path("").unwrap(), "");
        assert!(normalize_path("../etc/passwd").is_err());
        assert!(normalize_path("a/../../b").is_err());
    }
}
