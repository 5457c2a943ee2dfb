//! Remote mirror interface for the persistent tier.
//!
//! The virtual disk mirrors persistent writes and deletes to a
//! [`RemoteMirror`] and falls back to it when a local read fails. The mirror
//! is best effort: it is not kept consistent with the local tier beyond
//! those synchronous calls.

use bytes::Bytes;

/// Secondary store for persistent-tier files
pub trait RemoteMirror: Send + Sync + std::fmt::Debug {
    fn write(&self, path: &str, data: Bytes) -> Result<(), MirrorError>;

    fn read(&self, path: &str) -> Result<Bytes, MirrorError>;

    /// Removing an absent path succeeds
    fn delete(&self, path: &str) -> Result<(), MirrorError>;

    /// Paths starting with `prefix`, in order
    fn list(&self, prefix: &str) -> Result<Vec<String>, MirrorError>;
}

#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    #[error("not found in mirror: {0}")]
    NotFound(String),
    #[error("mirror backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("mirror runtime error: {0}")]
    Runtime(String),
}

impl MirrorError {
    pub fn backend(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        MirrorError::Backend(Box::new(err))
    }
}
