//! Cache backend capability trait.
//!
//! This module defines the capability every storage backend (in-memory map,
//! memcached, redis, ...) exposes to the fetch layer.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use cacher_core::{BackendResult, CachedValue};

/// Cache backend trait for pluggable cache implementations.
///
/// Implementations must be thread-safe; a single backend is shared by every
/// concurrent fetch. Any call may fail, and callers treat a failure as "the
/// backend state is unknown", never as data.
///
/// # Keys
///
/// Keys arrive already addressed (group prefix applied). Backends store
/// them verbatim.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Get a value from the cache.
    async fn get(&self, key: &str) -> BackendResult<Option<CachedValue>>;

    /// Get several values at once.
    ///
    /// Keys that are not cached may simply be missing from the result.
    /// Depending on the implementation this can be much cheaper than one
    /// `get` per key.
    async fn get_bulk(&self, keys: &[String]) -> BackendResult<HashMap<String, CachedValue>>;

    /// Put a value into the cache.
    async fn set(&self, key: &str, value: CachedValue) -> BackendResult<()>;

    /// Remove a single key.
    async fn remove(&self, key: &str) -> BackendResult<()>;

    /// Remove every entry.
    async fn clear(&self) -> BackendResult<()>;
}

#[async_trait]
impl<B: CacheBackend + ?Sized> CacheBackend for Arc<B> {
    async fn get(&self, key: &str) -> BackendResult<Option<CachedValue>> {
        (**self).get(key).await
    }

    async fn get_bulk(&self, keys: &[String]) -> BackendResult<HashMap<String, CachedValue>> {
        (**self).get_bulk(keys).await
    }

    async fn set(&self, key: &str, value: CachedValue) -> BackendResult<()> {
        (**self).set(key, value).await
    }

    async fn remove(&self, key: &str) -> BackendResult<()> {
        (**self).remove(key).await
    }

    async fn clear(&self) -> BackendResult<()> {
        (**self).clear().await
    }
}

/// Statistics about backend usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendStats {
    /// Number of keys found.
    pub hits: u64,
    /// Number of keys not found.
    pub misses: u64,
    /// Number of values written.
    pub writes: u64,
    /// Number of keys removed.
    pub removals: u64,
}

impl BackendStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
