//! Removing cached keys.

use std::sync::Arc;

use cacher_core::{addressed_key, CacheEvent, CacheEventListener, EventDispatcher};
use cacher_storage::CacheBackend;
use tracing::{info, warn};

/// Outcome of a [`Cleaner::clean`] call, in logical keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanReport {
    pub cleared: Vec<String>,
    pub errored: Vec<String>,
}

impl CleanReport {
    pub fn is_clean(&self) -> bool {
        self.errored.is_empty()
    }
}

/// Removes keys from the cache, one at a time, reporting what failed.
#[derive(Clone)]
pub struct Cleaner {
    backend: Arc<dyn CacheBackend>,
    events: EventDispatcher,
}

impl Cleaner {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self::with_listeners(backend, Vec::new())
    }

    pub fn with_listeners(
        backend: Arc<dyn CacheBackend>,
        listeners: Vec<Arc<dyn CacheEventListener>>,
    ) -> Self {
        Self {
            backend,
            events: EventDispatcher::new(listeners),
        }
    }

    /// Remove `keys` within `group`.
    ///
    /// A failure on one key does not stop the others. Listeners hear
    /// about the cleared keys and, separately, about the ones that failed.
    pub async fn clean(&self, group: Option<&str>, keys: &[String]) -> CleanReport {
        let mut report = CleanReport::default();
        for key in keys {
            let addressed = addressed_key(group, key);
            match self.backend.remove(&addressed).await {
                Ok(()) => report.cleared.push(key.clone()),
                Err(e) => {
                    warn!(key = %addressed, error = %e, "Unable to remove key from cache");
                    report.errored.push(key.clone());
                }
            }
        }

        info!(
            cleared = report.cleared.len(),
            errored = report.errored.len(),
            "Cleaned keys from cache"
        );
        self.events
            .fire(&CacheEvent::ClearedFromCache(report.cleared.clone()));
        self.events
            .fire(&CacheEvent::ErroredKeys(report.errored.clone()));
        report
    }

    pub async fn clean_key(&self, group: Option<&str>, key: &str) -> CleanReport {
        self.clean(group, &[key.to_string()]).await
    }
}

impl std::fmt::Debug for Cleaner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cleaner")
            .field("listeners", &self.events.len())
            .finish_non_exhaustive()
    }
}
