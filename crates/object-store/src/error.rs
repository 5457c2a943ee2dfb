use std::path::PathBuf;

/// Errors building a mirror
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("failed to create mirror directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to start mirror runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("invalid s3 url: {0}")]
    InvalidUrl(String),
}
