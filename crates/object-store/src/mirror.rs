//! [`RemoteMirror`] over an [`ObjectStore`]
//!
//! The disk calls the mirror synchronously, so the mirror owns a small tokio
//! runtime and drives each request on it. Requests are spawned onto the
//! runtime and awaited through a channel rather than with `block_on`, which
//! keeps the mirror usable from threads that are already inside a runtime.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use common::{MirrorError, RemoteMirror};
use futures::TryStreamExt;
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};
use tokio::runtime::Runtime;
use tracing::{debug, info};

use crate::config::MirrorConfig;
use crate::error::SetupError;

pub struct ObjectStoreMirror {
    store: Arc<dyn ObjectStore>,
    prefix: String,
    description: String,
    runtime: Option<Runtime>,
}

impl ObjectStoreMirror {
    pub fn new(config: &MirrorConfig) -> Result<Self, SetupError> {
        let store = config.build()?;
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("tierfs-mirror")
            .enable_all()
            .build()
            .map_err(SetupError::Runtime)?;

        let mirror = Self {
            store,
            prefix: config.prefix().trim_matches('/').to_string(),
            description: config.describe(),
            runtime: Some(runtime),
        };
        info!(backend = %mirror.description, prefix = %mirror.prefix, "remote mirror ready");
        Ok(mirror)
    }

    /// In-memory mirror, handy for tests
    pub fn in_memory() -> Result<Self, SetupError> {
        Self::new(&MirrorConfig::Memory {
            prefix: String::new(),
        })
    }

    fn key(&self, path: &str) -> Path {
        let path = path.trim_matches('/');
        if self.prefix.is_empty() {
            Path::from(path)
        } else {
            Path::from(format!("{}/{}", self.prefix, path))
        }
    }

    /// Logical path of a store key, if it lies under our prefix
    fn logical(&self, key: &Path) -> Option<String> {
        let key = key.as_ref();
        if self.prefix.is_empty() {
            return Some(key.to_string());
        }
        key.strip_prefix(self.prefix.as_str())?
            .strip_prefix('/')
            .map(str::to_string)
    }

    fn run<T, F>(&self, task: F) -> Result<T, MirrorError>
    where
        T: Send + 'static,
        F: Future<Output = Result<T, MirrorError>> + Send + 'static,
    {
        let runtime = self
            .runtime
            .as_ref()
            .ok_or_else(|| MirrorError::Runtime("mirror runtime is shut down".to_string()))?;

        let (tx, rx) = flume::bounded(1);
        runtime.spawn(async move {
            let _ = tx.send_async(task.await).await;
        });
        rx.recv()
            .map_err(|_| MirrorError::Runtime("mirror task was dropped".to_string()))?
    }
}

fn map_error(path: &str, err: object_store::Error) -> MirrorError {
    match err {
        object_store::Error::NotFound { .. } => MirrorError::NotFound(path.to_string()),
        err => MirrorError::backend(err),
    }
}

impl RemoteMirror for ObjectStoreMirror {
    fn write(&self, path: &str, data: Bytes) -> Result<(), MirrorError> {
        let store = self.store.clone();
        let key = self.key(path);
        let owned = path.to_string();
        let size = data.len();
        self.run(async move {
            store
                .put(&key, PutPayload::from(data))
                .await
                .map_err(|e| map_error(&owned, e))?;
            debug!(path = %owned, size, "mirrored file");
            Ok(())
        })
    }

    fn read(&self, path: &str) -> Result<Bytes, MirrorError> {
        let store = self.store.clone();
        let key = self.key(path);
        let owned = path.to_string();
        self.run(async move {
            let result = store.get(&key).await.map_err(|e| map_error(&owned, e))?;
            let data = result.bytes().await.map_err(|e| map_error(&owned, e))?;
            debug!(path = %owned, size = data.len(), "read file from mirror");
            Ok(data)
        })
    }

    fn delete(&self, path: &str) -> Result<(), MirrorError> {
        let store = self.store.clone();
        let key = self.key(path);
        let owned = path.to_string();
        self.run(async move {
            match store.delete(&key).await {
                Ok(()) | Err(object_store::Error::NotFound { .. }) => {
                    debug!(path = %owned, "removed file from mirror");
                    Ok(())
                }
                Err(e) => Err(MirrorError::backend(e)),
            }
        })
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, MirrorError> {
        let store = self.store.clone();
        let root = (!self.prefix.is_empty()).then(|| Path::from(self.prefix.as_str()));
        let metas = self.run(async move {
            store
                .list(root.as_ref())
                .try_collect::<Vec<_>>()
                .await
                .map_err(MirrorError::backend)
        })?;

        let mut paths: Vec<String> = metas
            .iter()
            .filter_map(|meta| self.logical(&meta.location))
            .filter(|path| path.starts_with(prefix))
            .collect();
        paths.sort();
        Ok(paths)
    }
}

impl Drop for ObjectStoreMirror {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl fmt::Debug for ObjectStoreMirror {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectStoreMirror")
            .field("backend", &self.description)
            .field("prefix", &self.prefix)
            .finish()
    }
}
