use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tempfile::TempDir;

use crate::error::{DiskError, Result};
use crate::mapped::MappedFile;
use crate::tier::StorageTier;

/// A file held in the buffer table
#[derive(Debug, Clone)]
pub struct BufferEntry {
    pub data: Bytes,
    pub modified: DateTime<Utc>,
    pub tier: StorageTier,
}

impl BufferEntry {
    pub fn new(data: Bytes, tier: StorageTier) -> Self {
        Self {
            data,
            modified: Utc::now(),
            tier,
        }
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Paths with an open mapped file, readable without the disk lock.
///
/// The eviction handler runs while the router holds the disk lock, so it
/// consults this set instead.
#[derive(Debug, Clone, Default)]
pub(crate) struct MappedPaths(Arc<Mutex<HashSet<String>>>);

impl MappedPaths {
    pub fn contains(&self, path: &str) -> bool {
        self.0.lock().contains(path)
    }
}

/// Everything guarded by the disk's readers-writer lock
#[derive(Default)]
pub(crate) struct DiskState {
    buffer: HashMap<String, BufferEntry>,
    buffer_bytes: u64,
    mapped: HashMap<String, Arc<MappedFile>>,
    mapped_paths: MappedPaths,
    pub temp_dir: Option<TempDir>,
    pub closed: bool,
}

impl DiskState {
    pub fn new(temp_dir: Option<TempDir>, mapped_paths: MappedPaths) -> Self {
        Self {
            temp_dir,
            mapped_paths,
            ..Default::default()
        }
    }

    pub fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(DiskError::Closed);
        }
        Ok(())
    }

    pub fn buffer(&self) -> &HashMap<String, BufferEntry> {
        &self.buffer
    }

    pub fn buffered(&self, path: &str) -> Option<&BufferEntry> {
        self.buffer.get(path)
    }

    /// Bytes held across the whole buffer table
    pub fn buffer_bytes(&self) -> u64 {
        self.buffer_bytes
    }

    pub fn insert_buffer(&mut self, path: String, entry: BufferEntry) {
        self.buffer_bytes += entry.size();
        if let Some(previous) = self.buffer.insert(path, entry) {
            self.buffer_bytes -= previous.size();
        }
    }

    pub fn remove_buffer(&mut self, path: &str) -> Option<BufferEntry> {
        let entry = self.buffer.remove(path)?;
        self.buffer_bytes -= entry.size();
        Some(entry)
    }

    pub fn clear_buffer(&mut self) {
        self.buffer.clear();
        self.buffer_bytes = 0;
    }

    #[cfg(test)]
    pub fn mapped_paths(&self) -> MappedPaths {
        self.mapped_paths.clone()
    }

    pub fn mapped(&self, path: &str) -> Option<&Arc<MappedFile>> {
        self.mapped.get(path)
    }

    pub fn is_mapped(&self, path: &str) -> bool {
        self.mapped.contains_key(path)
    }

    pub fn register_mapped(&mut self, path: String, file: Arc<MappedFile>) {
        self.mapped_paths.0.lock().insert(path.clone());
        self.mapped.insert(path, file);
    }

    pub fn unregister_mapped(&mut self, path: &str) -> Option<Arc<MappedFile>> {
        self.mapped_paths.0.lock().remove(path);
        self.mapped.remove(path)
    }

    pub fn drain_mapped(&mut self) -> Vec<(String, Arc<MappedFile>)> {
        self.mapped_paths.0.lock().clear();
        self.mapped.drain().collect()
    }
}
