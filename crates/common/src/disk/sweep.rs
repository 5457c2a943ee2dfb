//! Background expiry of ephemeral files
//!
//! The sweep runs on its own thread, woken every half TTL. It holds only a
//! weak reference to the disk so it never keeps a dropped disk alive, and it
//! exits as soon as its shutdown channel fires or disconnects.

use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::Duration;

use flume::RecvTimeoutError;
use tracing::{debug, warn};

use super::DiskInner;
use crate::error::{DiskError, Result};

pub(crate) struct Sweeper {
    shutdown: flume::Sender<()>,
    handle: JoinHandle<()>,
}

impl Sweeper {
    pub fn spawn(inner: &Arc<DiskInner>, interval: Duration) -> Result<Self> {
        let (shutdown, shutdown_rx) = flume::bounded::<()>(1);
        let disk: Weak<DiskInner> = Arc::downgrade(inner);

        let handle = std::thread::Builder::new()
            .name("tierfs-sweep".to_string())
            .spawn(move || {
                debug!(interval_ms = interval.as_millis() as u64, "sweep task started");
                loop {
                    match shutdown_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            let Some(disk) = disk.upgrade() else {
                                break;
                            };
                            disk.sweep();
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                debug!("sweep task stopped");
            })
            .map_err(DiskError::Spawn)?;

        Ok(Self { shutdown, handle })
    }

    /// Signal the task and wait for it to finish its current pass
    pub fn stop(self) {
        let _ = self.shutdown.try_send(());
        drop(self.shutdown);
        if self.handle.join().is_err() {
            warn!("sweep task panicked");
        }
    }
}
