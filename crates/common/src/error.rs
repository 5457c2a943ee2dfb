use std::io;
use std::path::PathBuf;

use crate::config::ConfigError;
use crate::mapped::MappedFileError;
use crate::mirror::MirrorError;
use crate::tier::InvalidPath;

/// Errors returned by the virtual disk
#[derive(Debug, thiserror::Error)]
pub enum DiskError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to set up {path}: {source}")]
    Setup { path: PathBuf, source: io::Error },
    #[error("file not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    InvalidPath(#[from] InvalidPath),
    #[error("i/o error on {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("failed to create directory {path}: {source}")]
    CreateDirectory { path: PathBuf, source: io::Error },
    #[error("failed to list files: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("mirror error: {0}")]
    Mirror(#[from] MirrorError),
    #[error("mapped file error: {0}")]
    MappedFile(#[from] MappedFileError),
    #[error("{0}")]
    Unsupported(String),
    #[error("{0} is open as a mapped file")]
    Mapped(String),
    #[error("{path} is already mapped with {open} bytes, not {requested}")]
    MappedSizeMismatch {
        path: String,
        open: u64,
        requested: u64,
    },
    #[error("failed to start sweep task: {0}")]
    Spawn(#[source] io::Error),
    #[error("virtual disk is closed")]
    Closed,
}

/// Coarse classification for front ends that map errors to responses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing resource
    NotFound,
    /// Validation or bounds failure
    BadRequest,
    /// Storage, mirror or setup failure
    Internal,
}

impl DiskError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DiskError::NotFound(_) | DiskError::Mirror(MirrorError::NotFound(_)) => {
                ErrorKind::NotFound
            }
            DiskError::InvalidPath(_)
            | DiskError::Unsupported(_)
            | DiskError::Mapped(_)
            | DiskError::MappedSizeMismatch { .. }
            | DiskError::MappedFile(MappedFileError::OutOfBounds { .. }) => ErrorKind::BadRequest,
            _ => ErrorKind::Internal,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

pub type Result<T> = std::result::Result<T, DiskError>;
