//! Storage router over the three tiers
//!
//! A [`VirtualDisk`] owns the buffer table, the cache, the event bus and the
//! optional remote mirror. Every logical path is normalized and classified
//! into a [`StorageTier`] before it is routed:
//!
//! * persistent paths live under the data partition and are mirrored
//! * `temp/` paths live under a process-local scratch directory, stripped of
//!   their prefix, and expire after the configured TTL
//! * `mem/` paths live only in the buffer table and the cache
//!
//! Writers take the router lock exclusively, readers share it. Events are
//! published once the lock has been released so handlers may call back into
//! the disk.

mod listing;
mod state;
mod sweep;

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub use listing::FileInfo;
pub use state::BufferEntry;

use crate::cache::{CacheStats, EvictionHandler, FileCache};
use crate::config::DiskConfig;
use crate::error::{DiskError, Result};
use crate::events::{Event, EventBus, EventKind, Metadata};
use crate::mapped::MappedFile;
use crate::mirror::RemoteMirror;
use crate::tier::{is_volatile_key, normalize_path, StorageTier, TEMP_PREFIX};

use state::{DiskState, MappedPaths};
use sweep::Sweeper;

/// Writes evicted persistent entries back to the data partition.
///
/// Keys in the `temp/` and `mem/` namespaces are never written back, nor
/// are paths currently open as mapped files.
#[derive(Debug, Clone)]
pub struct WriteBackOnEvict {
    data_partition: PathBuf,
    mapped: MappedPaths,
}

impl WriteBackOnEvict {
    pub fn new(data_partition: impl Into<PathBuf>) -> Self {
        Self {
            data_partition: data_partition.into(),
            mapped: MappedPaths::default(),
        }
    }

    pub(crate) fn skipping(mut self, mapped: MappedPaths) -> Self {
        self.mapped = mapped;
        self
    }
}

impl EvictionHandler for WriteBackOnEvict {
    fn on_evict(&self, key: &str, value: &Bytes) {
        if is_volatile_key(key) {
            return;
        }
        if self.mapped.contains(key) {
            debug!(key, "skipped write back of mapped file");
            return;
        }
        let path = self.data_partition.join(key);
        match std::fs::write(&path, value) {
            Ok(()) => debug!(key, size = value.len(), "wrote evicted entry back"),
            Err(e) => warn!(key, path = %path.display(), error = %e, "failed to write evicted entry back"),
        }
    }
}

/// Point-in-time usage summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskStats {
    /// Regular files under the data partition
    pub file_count: u64,
    /// Bytes held by those files
    pub used_bytes: u64,
    pub buffered_files: u64,
    pub buffered_bytes: u64,
    /// `None` when the cache is disabled
    pub cache: Option<CacheStats>,
}

pub(crate) struct DiskInner {
    data_partition: PathBuf,
    temp_path: Option<PathBuf>,
    config: DiskConfig,
    state: RwLock<DiskState>,
    cache: Option<FileCache>,
    events: EventBus,
    mirror: Option<Arc<dyn RemoteMirror>>,
}

impl DiskInner {
    fn tier_of(&self, path: &str) -> StorageTier {
        StorageTier::classify(path, self.config.enable_temp, self.config.enable_memory)
    }

    /// Backing file location of `path`; the in-memory tier has none
    fn location(&self, path: &str, tier: StorageTier) -> Option<PathBuf> {
        match tier {
            StorageTier::Persistent => Some(self.data_partition.join(path)),
            StorageTier::Ephemeral => {
                let relative = path.strip_prefix(TEMP_PREFIX).unwrap_or(path);
                self.temp_path.as_ref().map(|root| root.join(relative))
            }
            StorageTier::InMemory => None,
        }
    }

    fn cache_put(&self, path: &str, data: &Bytes) {
        if let Some(cache) = &self.cache {
            cache.put(path, data.clone(), data.len() as u64);
            cache.release(path);
        }
    }

    fn cache_get(&self, path: &str) -> Option<Bytes> {
        let cache = self.cache.as_ref()?;
        let data = cache.get(path)?;
        cache.release(path);
        Some(data)
    }

    fn publish(&self, event: Event) {
        for err in self.events.publish(&event) {
            warn!(kind = %event.kind, path = %event.path, error = %err, "event handler failed");
        }
    }

    /// Expire ephemeral entries older than the TTL. Returns how many went.
    fn sweep(&self) -> usize {
        let ttl = match chrono::Duration::from_std(self.config.temp_ttl) {
            Ok(ttl) => ttl,
            Err(_) => return 0,
        };
        let mut state = self.state.write();
        if state.closed {
            return 0;
        }

        let now = Utc::now();
        let expired: Vec<String> = state
            .buffer()
            .iter()
            .filter(|(path, entry)| {
                entry.tier == StorageTier::Ephemeral
                    && now - entry.modified > ttl
                    && !state.is_mapped(path)
            })
            .map(|(path, _)| path.clone())
            .collect();

        for path in &expired {
            state.remove_buffer(path);
            if let Some(cache) = &self.cache {
                cache.remove(path);
            }
            if let Some(location) = self.location(path, StorageTier::Ephemeral) {
                if let Err(e) = std::fs::remove_file(&location) {
                    if e.kind() != io::ErrorKind::NotFound {
                        warn!(path = %path, error = %e, "failed to remove expired file");
                    }
                }
            }
        }

        if !expired.is_empty() {
            info!(count = expired.len(), "swept expired ephemeral files");
        }
        expired.len()
    }
}

/// Tiered virtual disk
pub struct VirtualDisk {
    inner: Arc<DiskInner>,
    sweeper: Mutex<Option<Sweeper>>,
}

impl VirtualDisk {
    /// Create a disk without a remote mirror
    pub fn new(config: DiskConfig) -> Result<Self> {
        Self::with_mirror(config, None)
    }

    /// Create a disk, mirroring the persistent tier to `mirror` if given.
    ///
    /// Creates the data partition and, when the ephemeral tier is enabled, a
    /// fresh scratch directory. The sweep starts here if a TTL is set.
    pub fn with_mirror(config: DiskConfig, mirror: Option<Arc<dyn RemoteMirror>>) -> Result<Self> {
        config.validate()?;

        let data_partition = config.data_partition.clone();
        std::fs::create_dir_all(&data_partition).map_err(|source| DiskError::Setup {
            path: data_partition.clone(),
            source,
        })?;

        let temp_dir = if config.enable_temp {
            let dir = tempfile::Builder::new()
                .prefix("tierfs_temp_")
                .tempdir()
                .map_err(|source| DiskError::Setup {
                    path: std::env::temp_dir(),
                    source,
                })?;
            Some(dir)
        } else {
            None
        };
        let temp_path = temp_dir.as_ref().map(|dir| dir.path().to_path_buf());

        let mapped_paths = MappedPaths::default();
        let cache = (config.cache_size > 0).then(|| {
            let write_back =
                WriteBackOnEvict::new(data_partition.clone()).skipping(mapped_paths.clone());
            FileCache::new(config.cache_size, Arc::new(write_back))
        });

        let sweep_interval = config.sweep_interval();
        let inner = Arc::new(DiskInner {
            data_partition,
            temp_path,
            config,
            state: RwLock::new(DiskState::new(temp_dir, mapped_paths)),
            cache,
            events: EventBus::new(),
            mirror,
        });

        let sweeper = match sweep_interval {
            Some(interval) => Some(Sweeper::spawn(&inner, interval)?),
            None => None,
        };

        info!(
            data_partition = %inner.data_partition.display(),
            temp_dir = ?inner.temp_path,
            cache_size = inner.config.cache_size,
            mirrored = inner.mirror.is_some(),
            "virtual disk opened"
        );

        Ok(Self {
            inner,
            sweeper: Mutex::new(sweeper),
        })
    }

    /// Write `data` to `path`, replacing anything already there.
    ///
    /// A persistent write is mirrored after the local write has landed. If
    /// the mirror fails the error is returned but the local data stays.
    /// Paths open as mapped files are rejected until they are closed.
    pub fn write_file(&self, path: &str, data: impl Into<Bytes>) -> Result<()> {
        let path = normalize_path(path)?;
        let data: Bytes = data.into();
        let tier = self.inner.tier_of(&path);

        {
            let mut state = self.inner.state.write();
            state.ensure_open()?;
            if state.is_mapped(&path) {
                return Err(DiskError::Mapped(path));
            }

            match self.inner.location(&path, tier) {
                None => {
                    state.insert_buffer(path.clone(), BufferEntry::new(data.clone(), tier));
                    if state.buffer_bytes() > self.inner.config.buffer_size {
                        warn!(
                            buffered = state.buffer_bytes(),
                            limit = self.inner.config.buffer_size,
                            "in-memory buffer over its soft limit"
                        );
                    }
                }
                Some(location) => {
                    if let Some(parent) = location.parent() {
                        std::fs::create_dir_all(parent).map_err(|source| {
                            DiskError::CreateDirectory {
                                path: parent.to_path_buf(),
                                source,
                            }
                        })?;
                    }
                    std::fs::write(&location, &data).map_err(|source| DiskError::Io {
                        path: location.clone(),
                        source,
                    })?;
                    if tier == StorageTier::Ephemeral {
                        state.insert_buffer(path.clone(), BufferEntry::new(data.clone(), tier));
                    }
                }
            }

            self.inner.cache_put(&path, &data);
            debug!(path = %path, tier = %tier, size = data.len(), "wrote file");

            if tier == StorageTier::Persistent {
                if let Some(mirror) = &self.inner.mirror {
                    mirror.write(&path, data.clone())?;
                }
            }
        }

        self.inner.publish(
            Event::new(EventKind::Created, path).with_metadata(Metadata::for_write(data)),
        );
        Ok(())
    }

    /// Read `path` from the first place that has it: cache, buffer table,
    /// backing file, then for persistent paths the mirror
    pub fn read_file(&self, path: &str) -> Result<Bytes> {
        let path = normalize_path(path)?;
        let tier = self.inner.tier_of(&path);

        let data = {
            let state = self.inner.state.read();
            state.ensure_open()?;

            if let Some(data) = self.inner.cache_get(&path) {
                debug!(path = %path, "cache hit");
                data
            } else {
                let data = match state.buffered(&path) {
                    Some(entry) => entry.data.clone(),
                    None => self.read_backing(&path, tier)?,
                };
                self.inner.cache_put(&path, &data);
                data
            }
        };

        self.inner.publish(Event::new(EventKind::Accessed, path));
        Ok(data)
    }

    fn read_backing(&self, path: &str, tier: StorageTier) -> Result<Bytes> {
        let Some(location) = self.inner.location(path, tier) else {
            return Err(DiskError::NotFound(path.to_string()));
        };

        let local_err = match std::fs::read(&location) {
            Ok(data) => {
                debug!(path = %path, tier = %tier, size = data.len(), "read file");
                return Ok(Bytes::from(data));
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => DiskError::NotFound(path.to_string()),
            Err(source) => DiskError::Io {
                path: location,
                source,
            },
        };

        match (&self.inner.mirror, tier) {
            (Some(mirror), StorageTier::Persistent) => {
                debug!(path = %path, error = %local_err, "falling back to mirror");
                Ok(mirror.read(path)?)
            }
            _ => Err(local_err),
        }
    }

    /// Remove `path` from every place it may be. Removing an absent path
    /// succeeds. Cached copies are left to age out. Mapped paths must be
    /// closed first.
    pub fn delete_file(&self, path: &str) -> Result<()> {
        let path = normalize_path(path)?;
        let tier = self.inner.tier_of(&path);

        {
            let mut state = self.inner.state.write();
            state.ensure_open()?;
            if state.is_mapped(&path) {
                return Err(DiskError::Mapped(path));
            }

            state.remove_buffer(&path);

            if let Some(location) = self.inner.location(&path, tier) {
                match std::fs::remove_file(&location) {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(source) => {
                        return Err(DiskError::Io {
                            path: location,
                            source,
                        })
                    }
                }
            }

            if tier == StorageTier::Persistent {
                if let Some(mirror) = &self.inner.mirror {
                    mirror.delete(&path)?;
                }
            }
            debug!(path = %path, tier = %tier, "deleted file");
        }

        self.inner.publish(Event::new(EventKind::Deleted, path));
        Ok(())
    }

    /// Paths starting with `prefix` across the buffer table, the data
    /// partition and the mirror, sorted and de-duplicated
    pub fn list_files(&self, prefix: &str) -> Result<Vec<String>> {
        let prefix = normalize_prefix(prefix)?;
        let prefix = prefix.as_str();
        let state = self.inner.state.read();
        state.ensure_open()?;

        let mut files: BTreeSet<String> = state
            .buffer()
            .keys()
            .filter(|path| path.starts_with(prefix))
            .cloned()
            .collect();

        for info in listing::walk(&self.inner.data_partition, false)? {
            if info.path.starts_with(prefix) {
                files.insert(info.path);
            }
        }

        if let Some(mirror) = &self.inner.mirror {
            files.extend(mirror.list(prefix)?);
        }

        Ok(files.into_iter().collect())
    }

    /// Files and directories starting with `prefix`, with size and
    /// modification time. Buffered files win over on-disk ones.
    pub fn list_files_and_dirs(&self, prefix: &str) -> Result<Vec<FileInfo>> {
        let prefix = normalize_prefix(prefix)?;
        let prefix = prefix.as_str();
        let state = self.inner.state.read();
        state.ensure_open()?;

        let mut items: BTreeMap<String, FileInfo> = listing::walk(&self.inner.data_partition, true)?
            .into_iter()
            .filter(|info| info.path.starts_with(prefix))
            .map(|info| (info.path.clone(), info))
            .collect();

        for (path, entry) in state.buffer() {
            if path.starts_with(prefix) {
                items.insert(
                    path.clone(),
                    FileInfo {
                        path: path.clone(),
                        is_dir: false,
                        size: entry.size(),
                        modified: entry.modified,
                    },
                );
            }
        }

        Ok(items.into_values().collect())
    }

    /// Create `path` and its parents at its tier location. The root and
    /// in-memory paths need nothing on disk.
    pub fn create_directory(&self, path: &str) -> Result<()> {
        let path = normalize_path(path)?;
        let state = self.inner.state.write();
        state.ensure_open()?;

        if path.is_empty() {
            return Ok(());
        }
        let tier = self.inner.tier_of(&path);
        let Some(location) = self.inner.location(&path, tier) else {
            return Ok(());
        };

        std::fs::create_dir_all(&location).map_err(|source| DiskError::CreateDirectory {
            path: location.clone(),
            source,
        })?;
        debug!(path = %path, tier = %tier, "created directory");
        Ok(())
    }

    /// Open a mapped region of `size` bytes over `path`'s backing file,
    /// or return the one already open there if it has the same size
    pub fn open_mapped(&self, path: &str, size: u64) -> Result<Arc<MappedFile>> {
        let path = normalize_path(path)?;
        let tier = self.inner.tier_of(&path);
        let mut state = self.inner.state.write();
        state.ensure_open()?;

        if let Some(file) = state.mapped(&path) {
            if file.size() != size {
                return Err(DiskError::MappedSizeMismatch {
                    open: file.size(),
                    requested: size,
                    path,
                });
            }
            return Ok(file.clone());
        }

        let Some(location) = self.inner.location(&path, tier) else {
            return Err(DiskError::Unsupported(format!(
                "{path} is in the {tier} tier and has no backing file to map"
            )));
        };
        if let Some(parent) = location.parent() {
            std::fs::create_dir_all(parent).map_err(|source| DiskError::CreateDirectory {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let file = Arc::new(MappedFile::open(&location, size)?);
        state.register_mapped(path.clone(), file.clone());
        debug!(path = %path, tier = %tier, size, "opened mapped file");
        Ok(file)
    }

    /// Close and forget the mapped file at `path`
    pub fn close_mapped(&self, path: &str) -> Result<()> {
        let path = normalize_path(path)?;
        let mut state = self.inner.state.write();
        state.ensure_open()?;

        let Some(file) = state.unregister_mapped(&path) else {
            return Err(DiskError::NotFound(path));
        };
        file.close()?;
        Ok(())
    }

    pub fn stats(&self) -> Result<DiskStats> {
        let state = self.inner.state.read();
        state.ensure_open()?;

        let files = listing::walk(&self.inner.data_partition, false)?;
        Ok(DiskStats {
            file_count: files.len() as u64,
            used_bytes: files.iter().map(|info| info.size).sum(),
            buffered_files: state.buffer().len() as u64,
            buffered_bytes: state.buffer_bytes(),
            cache: self.inner.cache.as_ref().map(FileCache::stats),
        })
    }

    /// Run one sweep pass now rather than waiting for the timer
    pub fn sweep_expired(&self) -> Result<usize> {
        self.inner.state.read().ensure_open()?;
        Ok(self.inner.sweep())
    }

    /// Drop the buffer table. Buffered data is not persisted anywhere.
    pub fn flush(&self) -> Result<()> {
        let mut state = self.inner.state.write();
        state.ensure_open()?;
        state.clear_buffer();
        Ok(())
    }

    /// Stop the sweep, drop buffered data, close mapped files and remove
    /// the scratch directory.
    ///
    /// Every mapped file is closed even if an earlier one fails; the first
    /// failure is returned. Closing twice is a no-op.
    pub fn close(&self) -> Result<()> {
        if let Some(sweeper) = self.sweeper.lock().take() {
            sweeper.stop();
        }

        let mut state = self.inner.state.write();
        if state.closed {
            return Ok(());
        }
        state.closed = true;
        state.clear_buffer();

        let mut first_err: Option<DiskError> = None;
        for (path, file) in state.drain_mapped() {
            if let Err(e) = file.close() {
                warn!(path = %path, error = %e, "failed to close mapped file");
                if first_err.is_none() {
                    first_err = Some(e.into());
                }
            }
        }

        if let Some(temp_dir) = state.temp_dir.take() {
            let path = temp_dir.path().to_path_buf();
            if let Err(source) = temp_dir.close() {
                if first_err.is_none() {
                    first_err = Some(DiskError::Io { path, source });
                }
            }
        }

        info!(data_partition = %self.inner.data_partition.display(), "virtual disk closed");
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Register `handler` for events of `kind`
    pub fn subscribe<F>(&self, kind: EventKind, handler: F)
    where
        F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.inner.events.subscribe(kind, handler);
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    pub fn cache(&self) -> Option<&FileCache> {
        self.inner.cache.as_ref()
    }

    pub fn data_partition(&self) -> &Path {
        &self.inner.data_partition
    }

    /// Scratch directory of the ephemeral tier, if enabled
    pub fn temp_dir(&self) -> Option<&Path> {
        self.inner.temp_path.as_deref()
    }

    pub fn config(&self) -> &DiskConfig {
        &self.inner.config
    }

    /// Tier a path routes to
    pub fn tier_of(&self, path: &str) -> Result<StorageTier> {
        let path = normalize_path(path)?;
        Ok(self.inner.tier_of(&path))
    }
}

/// Normalize a listing prefix, keeping a trailing `/` so `docs/` does not
/// match `docs.txt`
fn normalize_prefix(prefix: &str) -> Result<String> {
    let mut normalized = normalize_path(prefix)?;
    if !normalized.is_empty() && prefix.trim_end().ends_with(['/', '\\']) {
        normalized.push('/');
    }
    Ok(normalized)
}

impl Drop for VirtualDisk {
    fn drop(&mut self) {
        if let Some(sweeper) = self.sweeper.get_mut().take() {
            sweeper.stop();
        }
    }
}

impl std::fmt::Debug for VirtualDisk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualDisk")
            .field("data_partition", &self.inner.data_partition)
            .field("temp_dir", &self.inner.temp_path)
            .field("cache", &self.inner.cache)
            .field("mirrored", &self.inner.mirror.is_some())
            .finish()
    }
}
