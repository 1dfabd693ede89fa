//! In-memory cache backend, a thin wrapper around a `HashMap`.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use cacher_core::{BackendError, BackendResult, CachedValue};
use tracing::debug;

use crate::traits::{BackendStats, CacheBackend};

/// Process-local backend. No eviction: entries live until removed or cleared.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    entries: RwLock<HashMap<String, CachedValue>>,
    stats: RwLock<BackendStats>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `key` is currently cached.
    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .read()
            .map(|e| e.contains_key(key))
            .unwrap_or(false)
    }

    /// Snapshot of usage counters.
    pub fn stats(&self) -> BackendStats {
        self.stats.read().map(|s| s.clone()).unwrap_or_default()
    }

    fn record(&self, update: impl FnOnce(&mut BackendStats)) {
        if let Ok(mut stats) = self.stats.write() {
            update(&mut stats);
        }
    }
}

fn poisoned() -> BackendError {
    BackendError::unavailable("in-memory cache lock poisoned")
}

#[async_trait]
impl CacheBackend for InMemoryBackend {
    async fn get(&self, key: &str) -> BackendResult<Option<CachedValue>> {
        let value = self.entries.read().map_err(|_| poisoned())?.get(key).cloned();
        debug!(key, hit = value.is_some(), "in-memory get");
        self.record(|s| {
            if value.is_some() {
                s.hits += 1;
            } else {
                s.misses += 1;
            }
        });
        Ok(value)
    }

    async fn get_bulk(&self, keys: &[String]) -> BackendResult<HashMap<String, CachedValue>> {
        let entries = self.entries.read().map_err(|_| poisoned())?;
        let found: HashMap<String, CachedValue> = keys
            .iter()
            .filter_map(|k| entries.get(k).map(|v| (k.clone(), v.clone())))
            .collect();
        drop(entries);

        debug!(requested = keys.len(), found = found.len(), "in-memory get_bulk");
        let hits = found.len() as u64;
        let misses = (keys.len() as u64).saturating_sub(hits);
        self.record(|s| {
            s.hits += hits;
            s.misses += misses;
        });
        Ok(found)
    }

    async fn set(&self, key: &str, value: CachedValue) -> BackendResult<()> {
        debug!(key, "in-memory set");
        self.entries
            .write()
            .map_err(|_| poisoned())?
            .insert(key.to_string(), value);
        self.record(|s| s.writes += 1);
        Ok(())
    }

    async fn remove(&self, key: &str) -> BackendResult<()> {
        debug!(key, "in-memory remove");
        if self
            .entries
            .write()
            .map_err(|_| poisoned())?
            .remove(key)
            .is_some()
        {
            self.record(|s| s.removals += 1);
        }
        Ok(())
    }

    async fn clear(&self) -> BackendResult<()> {
        debug!("in-memory clear");
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        let removed = entries.len() as u64;
        entries.clear();
        drop(entries);
        self.record(|s| s.removals += removed);
        Ok(())
    }
}
