//! Explicit invalidation.
//!
//! Unlike [`Cleaner`](crate::Cleaner), revocation reports the backend's
//! failure to the caller: code that revokes a key usually has to know
//! whether stale data may still be served.

use std::sync::Arc;

use cacher_core::{addressed_key, BackendResult};
use cacher_storage::CacheBackend;
use tracing::{info, warn};

#[derive(Clone)]
pub struct RevokeManager {
    backend: Arc<dyn CacheBackend>,
}

impl RevokeManager {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self { backend }
    }

    /// Drop a single key within `group`.
    pub async fn revoke(&self, group: Option<&str>, key: &str) -> BackendResult<()> {
        let addressed = addressed_key(group, key);
        self.backend.remove(&addressed).await.inspect_err(|e| {
            warn!(key = %addressed, error = %e, "Unable to revoke key");
        })
    }

    /// Drop everything the backend holds.
    pub async fn purge_all(&self) -> BackendResult<()> {
        self.backend.clear().await?;
        info!("Purged all cached entries");
        Ok(())
    }
}

impl std::fmt::Debug for RevokeManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RevokeManager").finish_non_exhaustive()
    }
}
