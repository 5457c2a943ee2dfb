//! Virtual disk construction from application config.

use std::sync::Arc;

use common::{DiskError, RemoteMirror, VirtualDisk};
use object_store::ObjectStoreMirror;

use crate::state::AppConfig;

#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("failed to set up mirror: {0}")]
    Mirror(#[from] object_store::SetupError),
    #[error("failed to open virtual disk: {0}")]
    Disk(#[from] DiskError),
}

/// Open the virtual disk described by `config`, with its mirror if any
pub fn setup_disk(config: &AppConfig) -> Result<VirtualDisk, SetupError> {
    let mirror = match &config.mirror {
        Some(mirror_config) => {
            tracing::info!(backend = %mirror_config.describe(), "using remote mirror");
            let mirror = ObjectStoreMirror::new(mirror_config)?;
            Some(Arc::new(mirror) as Arc<dyn RemoteMirror>)
        }
        None => None,
    };

    Ok(VirtualDisk::with_mirror(config.disk.clone(), mirror)?)
}
