//! Cache-aside fetch orchestration.
//!
//! `FetchManager` reads from the cache first and asks a fetcher only for
//! what is missing, writing the fetched values back. The backend is never
//! allowed to break a fetch: its failures are logged and treated as misses
//! (reads) or skipped (writes). Fetcher errors and type mismatches are the
//! only failures a caller sees.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use cacher_core::{
    addressed_key, addressed_keys, BackendError, CacheEvent, CacheEventListener, CachedValue,
    EventDispatcher, TypeMismatch,
};
use cacher_storage::CacheBackend;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error};

use crate::error::FetchError;
use crate::fetcher::{FetchMultiple, FetchSingle};

/// Orchestrates cache reads, fetcher calls and cache population.
#[derive(Clone)]
pub struct FetchManager {
    backend: Arc<dyn CacheBackend>,
    events: EventDispatcher,
}

impl std::fmt::Debug for FetchManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchManager")
            .field("listeners", &self.events.len())
            .finish_non_exhaustive()
    }
}

impl FetchManager {
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

    pub fn backend(&self) -> &Arc<dyn CacheBackend> {
        &self.backend
    }

    pub fn events(&self) -> &EventDispatcher {
        &self.events
    }

    /// Fetch one value, from the cache if present, from `fetcher` otherwise.
    ///
    /// An empty `key` is treated as absent and returns `Ok(None)` without
    /// touching the cache or the fetcher. A fetched value is written back
    /// under the addressed key unless the fetcher reported it absent.
    pub async fn fetch_single<T, F>(
        &self,
        group: Option<&str>,
        key: &str,
        fetcher: &F,
    ) -> Result<Option<T>, FetchError<F::Error>>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
        F: FetchSingle<T> + ?Sized,
    {
        if key.is_empty() {
            debug!("fetch_single called without a key");
            return Ok(None);
        }

        let addressed = addressed_key(group, key);
        let cached = match self.backend.get(&addressed).await {
            Ok(value) => value.filter(|v| !v.is_null()),
            Err(e) => {
                error!(key = %addressed, error = %e, "Unable to fetch from cache");
                None
            }
        };

        if let Some(value) = cached {
            let value = decode::<T>(key, value)?;
            self.events
                .fire(&CacheEvent::FetchedFromCache(vec![key.to_string()]));
            return Ok(Some(value));
        }

        let fetched = fetcher.fetch(key).await.map_err(FetchError::Fetcher)?;
        if let Some(value) = &fetched {
            self.add_to_cache(&addressed, value).await;
        }
        self.events
            .fire(&CacheEvent::FetchedFromFetcher(vec![key.to_string()]));
        Ok(fetched)
    }

    /// Fetch many values, asking `fetcher` only for the cache misses.
    ///
    /// Duplicate keys collapse to their first occurrence and empty keys
    /// are ignored. If the bulk cache read fails the whole batch counts as
    /// missed. Values the fetcher returns for keys it was not asked for
    /// are dropped.
    pub async fn fetch_multiple<T, F>(
        &self,
        group: Option<&str>,
        keys: &[String],
        fetcher: &F,
    ) -> Result<HashMap<String, T>, FetchError<F::Error>>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
        F: FetchMultiple<T> + ?Sized,
    {
        let requested = distinct_keys(keys);
        let mut results = HashMap::with_capacity(requested.len());
        if requested.is_empty() {
            return Ok(results);
        }

        let addressed = addressed_keys(group, &requested);
        let bulk_keys: Vec<String> = addressed.iter().map(|(_, a)| a.clone()).collect();

        let mut hits = Vec::new();
        let mut misses = Vec::new();
        match self.backend.get_bulk(&bulk_keys).await {
            Ok(mut cached) => {
                for (logical, addressed) in &addressed {
                    match cached.remove(addressed).filter(|v| !v.is_null()) {
                        Some(value) => {
                            results.insert(logical.clone(), decode::<T>(logical, value)?);
                            hits.push(logical.clone());
                        }
                        None => misses.push(logical.clone()),
                    }
                }
            }
            Err(e) => {
                error!(keys = ?bulk_keys, error = %e, "Unable to fetch from cache");
                misses = requested;
            }
        }

        self.events.fire(&CacheEvent::FetchedFromCache(hits));

        if misses.is_empty() {
            return Ok(results);
        }

        let fetched = fetcher.fetch(&misses).await.map_err(FetchError::Fetcher)?;
        let wanted: HashSet<&str> = misses.iter().map(String::as_str).collect();
        for (key, value) in fetched {
            if !wanted.contains(key.as_str()) {
                debug!(key = %key, "Fetcher returned a key that was not requested, dropping it");
                continue;
            }
            self.add_to_cache(&addressed_key(group, &key), &value).await;
            results.insert(key, value);
        }

        self.events.fire(&CacheEvent::FetchedFromFetcher(misses));
        Ok(results)
    }

    /// Write a fetched value back. Failures are logged, never raised.
    async fn add_to_cache<T: Serialize>(&self, key: &str, value: &T) {
        let value = match encode(key, value) {
            Ok(CachedValue::Null) => return,
            Ok(value) => value,
            Err(e) => {
                error!(key, error = %e, "Unable to add to cache");
                return;
            }
        };

        if let Err(e) = self.backend.set(key, value).await {
            error!(key, error = %e, "Unable to add to cache");
        }
    }
}

fn decode<T: DeserializeOwned>(key: &str, value: CachedValue) -> Result<T, TypeMismatch> {
    serde_json::from_value(value).map_err(|e| TypeMismatch::new::<T>(key, e))
}

fn encode<T: Serialize>(key: &str, value: &T) -> Result<CachedValue, BackendError> {
    serde_json::to_value(value).map_err(|e| BackendError::Serialization {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

fn distinct_keys(keys: &[String]) -> Vec<String> {
    let mut seen = HashSet::with_capacity(keys.len());
    keys.iter()
        .filter(|k| !k.is_empty() && seen.insert(k.as_str()))
        .cloned()
        .collect()
}
