//! cacher test utilities
//!
//! Shared test infrastructure for the cacher workspace:
//! - `MockBackend` with failure injection and call counters
//! - Recording, failing and panicking event listeners
//! - Serde fixtures (`Apple`, `Pear`)
//! - Proptest generators for keys
//! - Test tracing setup

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use cacher_core::{
    BackendError, BackendResult, CacheEvent, CacheEventListener, CachedValue, ListenerError,
    ListenerResult,
};
pub use cacher_storage::{CacheBackend, InMemoryBackend};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ============================================================================
// MOCK BACKEND
// ============================================================================

/// Per-method call counters of a [`MockBackend`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub get: usize,
    pub get_bulk: usize,
    pub set: usize,
    pub remove: usize,
    pub clear: usize,
}

/// In-memory backend whose calls can be made to fail.
///
/// Failures are injected per method (`fail_get`, `fail_get_bulk`,
/// `fail_clear`) or per addressed key (`fail_set_for`, `fail_remove_for`).
#[derive(Debug, Default)]
pub struct MockBackend {
    entries: Mutex<HashMap<String, CachedValue>>,
    fail_get: AtomicBool,
    fail_get_bulk: AtomicBool,
    fail_clear: AtomicBool,
    failing_sets: Mutex<HashSet<String>>,
    failing_removes: Mutex<HashSet<String>>,
    get_calls: AtomicUsize,
    get_bulk_calls: AtomicUsize,
    set_calls: AtomicUsize,
    remove_calls: AtomicUsize,
    clear_calls: AtomicUsize,
    bulk_requests: Mutex<Vec<Vec<String>>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an entry without counting a call.
    pub fn with_entry(self, key: impl Into<String>, value: CachedValue) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&self, key: impl Into<String>, value: CachedValue) {
        lock(&self.entries).insert(key.into(), value);
    }

    /// Stored value for `key`, without counting a call.
    pub fn peek(&self, key: &str) -> Option<CachedValue> {
        lock(&self.entries).get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        lock(&self.entries).contains_key(key)
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.entries).is_empty()
    }

    pub fn fail_get(&self, fail: bool) {
        self.fail_get.store(fail, Ordering::SeqCst);
    }

    pub fn fail_get_bulk(&self, fail: bool) {
        self.fail_get_bulk.store(fail, Ordering::SeqCst);
    }

    pub fn fail_clear(&self, fail: bool) {
        self.fail_clear.store(fail, Ordering::SeqCst);
    }

    pub fn fail_set_for(&self, key: impl Into<String>) {
        lock(&self.failing_sets).insert(key.into());
    }

    pub fn fail_remove_for(&self, key: impl Into<String>) {
        lock(&self.failing_removes).insert(key.into());
    }

    pub fn calls(&self) -> CallCounts {
        CallCounts {
            get: self.get_calls.load(Ordering::SeqCst),
            get_bulk: self.get_bulk_calls.load(Ordering::SeqCst),
            set: self.set_calls.load(Ordering::SeqCst),
            remove: self.remove_calls.load(Ordering::SeqCst),
            clear: self.clear_calls.load(Ordering::SeqCst),
        }
    }

    /// Key lists passed to `get_bulk`, in call order.
    pub fn bulk_requests(&self) -> Vec<Vec<String>> {
        lock(&self.bulk_requests).clone()
    }
}

fn injected(operation: &str) -> BackendError {
    BackendError::unavailable(format!("injected {} failure", operation))
}

#[async_trait]
impl CacheBackend for MockBackend {
    async fn get(&self, key: &str) -> BackendResult<Option<CachedValue>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(injected("get"));
        }
        Ok(self.peek(key))
    }

    async fn get_bulk(&self, keys: &[String]) -> BackendResult<HashMap<String, CachedValue>> {
        self.get_bulk_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.bulk_requests).push(keys.to_vec());
        if self.fail_get_bulk.load(Ordering::SeqCst) {
            return Err(injected("get_bulk"));
        }
        let entries = lock(&self.entries);
        Ok(keys
            .iter()
            .filter_map(|k| entries.get(k).map(|v| (k.clone(), v.clone())))
            .collect())
    }

    async fn set(&self, key: &str, value: CachedValue) -> BackendResult<()> {
        self.set_calls.fetch_add(1, Ordering::SeqCst);
        if lock(&self.failing_sets).contains(key) {
            return Err(injected("set"));
        }
        self.insert(key, value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> BackendResult<()> {
        self.remove_calls.fetch_add(1, Ordering::SeqCst);
        if lock(&self.failing_removes).contains(key) {
            return Err(injected("remove"));
        }
        lock(&self.entries).remove(key);
        Ok(())
    }

    async fn clear(&self) -> BackendResult<()> {
        self.clear_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_clear.load(Ordering::SeqCst) {
            return Err(injected("clear"));
        }
        lock(&self.entries).clear();
        Ok(())
    }
}

// ============================================================================
// LISTENERS
// ============================================================================

/// Records every event it receives.
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: Mutex<Vec<CacheEvent>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<CacheEvent> {
        lock(&self.events).clone()
    }

    fn record(&self, event: CacheEvent) -> ListenerResult {
        lock(&self.events).push(event);
        Ok(())
    }
}

impl CacheEventListener for RecordingListener {
    fn fetched_from_cache(&self, keys: &[String]) -> ListenerResult {
        self.record(CacheEvent::FetchedFromCache(keys.to_vec()))
    }

    fn fetched_from_fetcher(&self, keys: &[String]) -> ListenerResult {
        self.record(CacheEvent::FetchedFromFetcher(keys.to_vec()))
    }

    fn cleared_from_cache(&self, keys: &[String]) -> ListenerResult {
        self.record(CacheEvent::ClearedFromCache(keys.to_vec()))
    }

    fn errored_keys(&self, keys: &[String]) -> ListenerResult {
        self.record(CacheEvent::ErroredKeys(keys.to_vec()))
    }
}

/// Fails every callback.
#[derive(Debug, Default)]
pub struct FailingListener;

impl CacheEventListener for FailingListener {
    fn fetched_from_cache(&self, _keys: &[String]) -> ListenerResult {
        Err(ListenerError::new("listener refused fetched_from_cache"))
    }

    fn fetched_from_fetcher(&self, _keys: &[String]) -> ListenerResult {
        Err(ListenerError::new("listener refused fetched_from_fetcher"))
    }

    fn cleared_from_cache(&self, _keys: &[String]) -> ListenerResult {
        Err(ListenerError::new("listener refused cleared_from_cache"))
    }

    fn errored_keys(&self, _keys: &[String]) -> ListenerResult {
        Err(ListenerError::new("listener refused errored_keys"))
    }
}

/// Panics in every callback.
#[derive(Debug, Default)]
pub struct PanickingListener;

impl CacheEventListener for PanickingListener {
    fn fetched_from_cache(&self, _keys: &[String]) -> ListenerResult {
        panic!("listener panicked in fetched_from_cache")
    }

    fn fetched_from_fetcher(&self, _keys: &[String]) -> ListenerResult {
        panic!("listener panicked in fetched_from_fetcher")
    }

    fn cleared_from_cache(&self, _keys: &[String]) -> ListenerResult {
        panic!("listener panicked in cleared_from_cache")
    }

    fn errored_keys(&self, _keys: &[String]) -> ListenerResult {
        panic!("listener panicked in errored_keys")
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Apple {
    pub id: String,
    pub variety: String,
}

impl Apple {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            variety: format!("variety-{}", id),
            id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pear {
    pub id: u64,
    pub ripe: bool,
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    use proptest::collection::vec;
    use proptest::prelude::*;

    /// Non-empty logical key.
    pub fn arb_key() -> impl Strategy<Value = String> {
        "[a-z0-9]{1,8}"
    }

    /// Up to `max` keys, possibly with duplicates.
    pub fn arb_key_set(max: usize) -> impl Strategy<Value = Vec<String>> {
        vec(arb_key(), 0..=max)
    }

    pub fn arb_group() -> impl Strategy<Value = Option<String>> {
        prop_oneof![Just(None), "[a-z]{1,4}:".prop_map(Some)]
    }
}

// ============================================================================
// TRACING
// ============================================================================

/// Install a test-friendly tracing subscriber once per process.
///
/// Filter with `RUST_LOG`; defaults to `warn`.
pub fn init_test_tracing() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_mock_backend_injected_failures() {
        let backend = MockBackend::new().with_entry("a", json!(1));
        backend.fail_get(true);
        backend.fail_remove_for("a");

        assert!(backend.get("a").await.is_err());
        assert!(backend.remove("a").await.is_err());
        assert!(backend.contains("a"));
        assert_eq!(backend.calls().get, 1);
        assert_eq!(backend.calls().remove, 1);
    }

    #[tokio::test]
    async fn test_mock_backend_records_bulk_requests() {
        let backend = MockBackend::new().with_entry("a", json!(1));

        let values = backend
            .get_bulk(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();

        assert_eq!(values.len(), 1);
        assert_eq!(backend.bulk_requests(), vec![vec!["a".to_string(), "b".to_string()]]);
    }

    #[test]
    fn test_recording_listener_keeps_order() {
        let listener = RecordingListener::new();
        listener.fetched_from_cache(&["a".to_string()]).unwrap();
        listener.errored_keys(&["b".to_string()]).unwrap();

        assert_eq!(
            listener.events(),
            vec![
                CacheEvent::FetchedFromCache(vec!["a".to_string()]),
                CacheEvent::ErroredKeys(vec!["b".to_string()]),
            ]
        );
    }
}
