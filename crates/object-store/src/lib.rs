//! Object storage remote mirror
//!
//! Implements the core's [`common::RemoteMirror`] on top of the
//! `object_store` crate, so the persistent tier can be mirrored to S3, MinIO,
//! a local directory or process memory.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use common::{DiskConfig, VirtualDisk};
//! use tierfs_object_store::{MirrorConfig, ObjectStoreMirror};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = MirrorConfig::parse_s3_url("s3://minioadmin:minioadmin@localhost:9000/tierfs")?;
//! let mirror = ObjectStoreMirror::new(&config)?;
//!
//! let disk = VirtualDisk::with_mirror(DiskConfig::new("/tmp/tierfs/data"), Some(Arc::new(mirror)))?;
//! disk.write_file("docs/a.txt", "mirrored")?;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod mirror;

pub use config::MirrorConfig;
pub use error::SetupError;
pub use mirror::ObjectStoreMirror;
