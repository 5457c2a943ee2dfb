//! Fixed-size memory-mapped files.
//!
//! A [`MappedFile`] maps a backing file read/write and shared with the
//! underlying storage. The region size is fixed when the file is opened;
//! growing it means closing and reopening with a larger size.
//!
//! Every write is flushed synchronously before it returns.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use memmap2::{MmapMut, MmapOptions};
use parking_lot::RwLock;
use tracing::debug;

/// A mapped region and the file descriptor it was created from.
///
/// The two share a lifetime: they are created together and torn down
/// together by [`MappedFile::close`].
struct Region {
    file: File,
    map: MmapMut,
}

/// Fixed-size byte-addressable region backed by a file.
///
/// Reads take a shared lock, writes and close take an exclusive one.
pub struct MappedFile {
    path: PathBuf,
    size: u64,
    region: RwLock<Option<Region>>,
}

impl MappedFile {
    /// Open or create `path` and map `size` bytes of it.
    ///
    /// The file is extended to `size` if it is shorter. A longer file is
    /// left as it is and only its first `size` bytes are mapped.
    pub fn open(path: impl AsRef<Path>, size: u64) -> Result<Self, MappedFileError> {
        let path = path.as_ref().to_path_buf();
        let len = usize::try_from(size).map_err(|_| MappedFileError::TooLarge { size })?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|source| MappedFileError::Open {
                path: path.clone(),
                source,
            })?;

        let current = file
            .metadata()
            .map_err(|source| MappedFileError::Stat {
                path: path.clone(),
                source,
            })?
            .len();

        if current < size {
            file.set_len(size).map_err(|source| MappedFileError::Resize {
                path: path.clone(),
                source,
            })?;
        }

        // SAFETY: the mapping is owned by this MappedFile together with the
        // file handle, and all access to the bytes goes through the RwLock.
        let map = unsafe { MmapOptions::new().len(len).map_mut(&file) }.map_err(|source| {
            MappedFileError::Map {
                path: path.clone(),
                source,
            }
        })?;

        debug!(path = %path.display(), size, "mapped file opened");

        Ok(Self {
            path,
            size,
            region: RwLock::new(Some(Region { file, map })),
        })
    }

    /// Copy `data` into the region at `offset` and flush it to storage.
    pub fn write(&self, offset: u64, data: &[u8]) -> Result<(), MappedFileError> {
        let mut guard = self.region.write();
        let region = guard.as_mut().ok_or(MappedFileError::Closed)?;

        let (start, end) = self.bounds(offset, data.len() as u64)?;
        region.map[start..end].copy_from_slice(data);
        region.map.flush().map_err(MappedFileError::Flush)
    }

    /// Copy `len` bytes starting at `offset` out of the region.
    pub fn read(&self, offset: u64, len: u64) -> Result<Vec<u8>, MappedFileError> {
        let guard = self.region.read();
        let region = guard.as_ref().ok_or(MappedFileError::Closed)?;

        let (start, end) = self.bounds(offset, len)?;
        Ok(region.map[start..end].to_vec())
    }

    /// Force the whole region out to storage.
    pub fn sync(&self) -> Result<(), MappedFileError> {
        let guard = self.region.read();
        let region = guard.as_ref().ok_or(MappedFileError::Closed)?;
        region.map.flush().map_err(MappedFileError::Flush)
    }

    /// Unmap the region, then close the backing file.
    ///
    /// Closing an already closed file is a no-op.
    pub fn close(&self) -> Result<(), MappedFileError> {
        let mut guard = self.region.write();
        let Some(Region { file, map }) = guard.take() else {
            return Ok(());
        };

        // memmap2 unmaps on drop; flush first so a failing msync is reported.
        let flushed = map.flush();
        drop(map);
        flushed.map_err(MappedFileError::Flush)?;

        file.sync_all().map_err(MappedFileError::Close)?;
        drop(file);

        debug!(path = %self.path.display(), "mapped file closed");
        Ok(())
    }

    /// Declared size of the region in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_closed(&self) -> bool {
        self.region.read().is_none()
    }

    fn bounds(&self, offset: u64, len: u64) -> Result<(usize, usize), MappedFileError> {
        let out_of_bounds = MappedFileError::OutOfBounds {
            offset,
            len,
            size: self.size,
        };
        let end = offset.checked_add(len).ok_or(out_of_bounds)?;
        if end > self.size {
            return Err(MappedFileError::OutOfBounds {
                offset,
                len,
                size: self.size,
            });
        }
        // size fits in usize (checked at open), so both ends do too
        Ok((offset as usize, end as usize))
    }
}

impl std::fmt::Debug for MappedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedFile")
            .field("path", &self.path)
            .field("size", &self.size)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MappedFileError {
    #[error("failed to open {path}: {source}")]
    Open { path: PathBuf, source: io::Error },
    #[error("failed to stat {path}: {source}")]
    Stat { path: PathBuf, source: io::Error },
    #[error("failed to resize {path}: {source}")]
    Resize { path: PathBuf, source: io::Error },
    #[error("failed to map {path}: {source}")]
    Map { path: PathBuf, source: io::Error },
    #[error("mapping of {size} bytes is not addressable on this platform")]
    TooLarge { size: u64 },
    #[error("range {offset}+{len} exceeds mapped size {size}")]
    OutOfBounds { offset: u64, len: u64, size: u64 },
    #[error("mapped file is closed")]
    Closed,
    #[error("failed to flush mapping: {0}")]
    Flush(#[source] io::Error),
    #[error("failed to close backing file: {0}")]
    Close(#[source] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn open_in(dir: &tempfile::TempDir, name: &str, size: u64) -> MappedFile {
        MappedFile::open(dir.path().join(name), size).unwrap()
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let mapped = open_in(&dir, "region.dat", 100);

        mapped.write(10, b"hello").unwrap();
        assert_eq!(mapped.read(10, 5).unwrap(), b"hello");

        // Untouched bytes of a freshly extended file are zero
        assert_eq!(mapped.read(0, 4).unwrap(), vec![0u8; 4]);
    }

    #[test]
    fn test_write_at_end_of_region() {
        let dir = tempfile::tempdir().unwrap();
        let mapped = open_in(&dir, "region.dat", 100);

        mapped.write(90, &[7u8; 10]).unwrap();
        assert_eq!(mapped.read(90, 10).unwrap(), vec![7u8; 10]);
    }

    #[test]
    fn test_write_past_end_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mapped = open_in(&dir, "region.dat", 100);

        let err = mapped.write(95, &[1u8; 10]).unwrap_err();
        assert!(matches!(
            err,
            MappedFileError::OutOfBounds {
                offset: 95,
                len: 10,
                size: 100
            }
        ));

        // Nothing was partially written
        assert_eq!(mapped.read(95, 5).unwrap(), vec![0u8; 5]);
    }

    #[test]
    fn test_read_past_end_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mapped = open_in(&dir, "region.dat", 16);

        assert!(matches!(
            mapped.read(8, 9),
            Err(MappedFileError::OutOfBounds { .. })
        ));
        assert!(matches!(
            mapped.read(u64::MAX, 2),
            Err(MappedFileError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_open_extends_short_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.dat");
        std::fs::write(&path, b"abc").unwrap();

        let mapped = MappedFile::open(&path, 64).unwrap();
        assert_eq!(mapped.read(0, 3).unwrap(), b"abc");
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 64);
    }

    #[test]
    fn test_open_never_shrinks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("long.dat");
        std::fs::write(&path, vec![1u8; 128]).unwrap();

        let mapped = MappedFile::open(&path, 32).unwrap();
        assert_eq!(mapped.size(), 32);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 128);
        assert!(mapped.read(0, 33).is_err());
    }

    #[test]
    fn test_writes_reach_backing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("durable.dat");

        let mapped = MappedFile::open(&path, 8).unwrap();
        mapped.write(0, b"durable!").unwrap();
        mapped.close().unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"durable!");
    }

    #[test]
    fn test_closed_file_rejects_operations() {
        let dir = tempfile::tempdir().unwrap();
        let mapped = open_in(&dir, "closed.dat", 8);

        mapped.close().unwrap();
        assert!(mapped.is_closed());

        assert!(matches!(mapped.write(0, b"x"), Err(MappedFileError::Closed)));
        assert!(matches!(mapped.read(0, 1), Err(MappedFileError::Closed)));
        assert!(matches!(mapped.sync(), Err(MappedFileError::Closed)));

        // Closing twice is fine
        mapped.close().unwrap();
    }

    #[test]
    fn test_concurrent_readers() {
        let dir = tempfile::tempdir().unwrap();
        let mapped = Arc::new(open_in(&dir, "shared.dat", 1024));
        mapped.write(0, &[42u8; 1024]).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let mapped = mapped.clone();
                std::thread::spawn(move || mapped.read(0, 1024).unwrap())
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), vec![42u8; 1024]);
        }
    }
}
