//! Tiered virtual storage engine
//!
//! Files are addressed by logical path and routed by prefix to one of three
//! tiers: the persistent data partition, an expiring scratch directory
//! (`temp/`), or an in-memory table (`mem/`). Reads go through a pinned,
//! size-bounded LRU cache, file lifecycle changes are published on an event
//! bus, and the persistent tier can be mirrored to remote storage.
//!
//! # Example
//!
//! ```rust,no_run
//! use common::{DiskConfig, EventKind, VirtualDisk};
//!
//! # fn example() -> Result<(), common::DiskError> {
//! let disk = VirtualDisk::new(DiskConfig::new("/tmp/tierfs/data"))?;
//!
//! disk.subscribe(EventKind::Created, |event| {
//!     println!("created {} ({:?} bytes)", event.path, event.metadata.size());
//!     Ok(())
//! });
//!
//! disk.write_file("docs/readme.txt", "hello")?;
//! disk.write_file("mem/session", "scratch")?;
//! assert_eq!(&disk.read_file("docs/readme.txt")?[..], b"hello");
//!
//! disk.close()?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod disk;
pub mod error;
pub mod events;
pub mod mapped;
pub mod mirror;
pub mod tier;

pub use cache::{CacheStats, DiscardOnEvict, EvictionHandler, FileCache};
pub use config::{ConfigError, DiskConfig};
pub use disk::{BufferEntry, DiskStats, FileInfo, VirtualDisk, WriteBackOnEvict};
pub use error::{DiskError, ErrorKind};
pub use events::{Event, EventBus, EventKind, Metadata, MetadataValue};
pub use mapped::{MappedFile, MappedFileError};
pub use mirror::{MirrorError, RemoteMirror};
pub use tier::{normalize_path, InvalidPath, StorageTier};

/// Crate version, for front ends
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
