use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::storage::models::FileRecord;
use crate::storage::{RecordStore, StoreError};

/// Which record store produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Local,
    Remote,
}

/// A result tagged with the backend that served it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Served<T> {
    pub backend: Backend,
    pub value: T,
}

/// Chooses between the remote and the local record store for each operation.
///
/// Reachability is probed on every call; nothing about the remote's liveness is
/// remembered between operations.
pub struct AvailabilitySelector {
    local: Arc<dyn RecordStore>,
    remote: Option<Arc<dyn RecordStore>>,
}

impl AvailabilitySelector {
    pub fn new(local: Arc<dyn RecordStore>, remote: Option<Arc<dyn RecordStore>>) -> Self {
        Self { local, remote }
    }

    pub fn local_only(local: Arc<dyn RecordStore>) -> Self {
        Self::new(local, None)
    }

    /// One cheap read against the remote store. A single failure means unavailable.
    pub async fn is_remote_available(&self) -> bool {
        let Some(remote) = &self.remote else {
            return false;
        };

        match remote.ping().await {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "Remote store unreachable");
                false
            }
        }
    }

    /// Copy records the remote served into the local store so reactions and views on
    /// them still work after the remote goes away. A failed copy only costs the
    /// fallback for those records, so it is logged and not returned.
    pub async fn mirror_locally(&self, files: &[FileRecord]) {
        if files.is_empty() {
            return;
        }
        if let Err(e) = self.local.mirror_files(files).await {
            warn!(error = %e, files = files.len(), "Could not mirror remote files locally");
        }
    }

    /// Drop the local copy of a file the remote deleted.
    pub async fn forget_locally(&self, id: &str) {
        match self.local.delete_file(id).await {
            Ok(()) | Err(StoreError::NotFound(_)) => {}
            Err(e) => warn!(file_id = %id, error = %e, "Could not drop local copy"),
        }
    }

    /// Run `operation` on the remote store when it is reachable, otherwise on the
    /// local one. A remote attempt that fails for backend reasons is re-run once on
    /// the local store; errors about the request itself are returned as they are.
    pub async fn execute<T, F, Fut>(&self, name: &str, operation: F) -> Result<Served<T>, StoreError>
    where
        F: Fn(Arc<dyn RecordStore>) -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        if let Some(remote) = &self.remote {
            if self.is_remote_available().await {
                match operation(Arc::clone(remote)).await {
                    Ok(value) => {
                        return Ok(Served {
                            backend: Backend::Remote,
                            value,
                        })
                    }
                    Err(e) if e.is_unavailable() => {
                        warn!(operation = name, error = %e, "Remote store failed, using local store");
                    }
                    Err(e) => return Err(e),
                }
            } else {
                warn!(operation = name, "Remote store unreachable, using local store");
            }
        }

        let value = operation(Arc::clone(&self.local)).await?;
        Ok(Served {
            backend: Backend::Local,
            value,
        })
    }
}
