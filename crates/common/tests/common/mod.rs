//! Shared setup for virtual disk integration tests

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ::common::{DiskConfig, MirrorError, RemoteMirror, VirtualDisk};
use bytes::Bytes;
use parking_lot::Mutex;
use tempfile::TempDir;

/// Mirror double that keeps objects in a map and can be told to fail writes
#[derive(Debug, Default)]
pub struct MemoryMirror {
    objects: Mutex<BTreeMap<String, Bytes>>,
    fail_writes: AtomicBool,
}

impl MemoryMirror {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn insert(&self, path: &str, data: &'static [u8]) {
        self.objects
            .lock()
            .insert(path.to_string(), Bytes::from_static(data));
    }

    pub fn contains(&self, path: &str) -> bool {
        self.objects.lock().contains_key(path)
    }
}

impl RemoteMirror for MemoryMirror {
    fn write(&self, path: &str, data: Bytes) -> Result<(), MirrorError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(MirrorError::Runtime("mirror unavailable".to_string()));
        }
        self.objects.lock().insert(path.to_string(), data);
        Ok(())
    }

    fn read(&self, path: &str) -> Result<Bytes, MirrorError> {
        self.objects
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| MirrorError::NotFound(path.to_string()))
    }

    fn delete(&self, path: &str) -> Result<(), MirrorError> {
        self.objects.lock().remove(path);
        Ok(())
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, MirrorError> {
        Ok(self
            .objects
            .lock()
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }
}

/// Route test logs through the test harness
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Config rooted in a fresh temp directory with the sweep disabled
pub fn test_config() -> (DiskConfig, TempDir) {
    let temp = tempfile::tempdir().expect("failed to create temp dir");
    let mut config = DiskConfig::new(temp.path().join("data"));
    config.temp_ttl = Duration::ZERO;
    (config, temp)
}

pub fn setup_disk() -> (VirtualDisk, TempDir) {
    let (config, temp) = test_config();
    let disk = VirtualDisk::new(config).expect("failed to create disk");
    (disk, temp)
}

pub fn setup_mirrored_disk() -> (VirtualDisk, Arc<MemoryMirror>, TempDir) {
    let (config, temp) = test_config();
    let mirror = MemoryMirror::new();
    let disk = VirtualDisk::with_mirror(config, Some(mirror.clone() as Arc<dyn RemoteMirror>))
        .expect("failed to create disk");
    (disk, mirror, temp)
}
