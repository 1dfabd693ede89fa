//! Cache events and best-effort listener dispatch.
//!
//! Events fire after an operation completes. Every listener sees every
//! event in registration order; a listener that errors or panics is logged
//! and skipped, and the caller never observes the failure.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::error;

use crate::error::ListenerError;

/// Result returned by listener callbacks.
pub type ListenerResult = Result<(), ListenerError>;

/// Something observable the cache layer did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    /// Keys served from the backend.
    FetchedFromCache(Vec<String>),
    /// Keys computed by the fetcher.
    FetchedFromFetcher(Vec<String>),
    /// Keys removed from the backend.
    ClearedFromCache(Vec<String>),
    /// Keys whose removal failed.
    ErroredKeys(Vec<String>),
}

impl CacheEvent {
    /// Logical keys carried by this event.
    pub fn keys(&self) -> &[String] {
        match self {
            CacheEvent::FetchedFromCache(keys)
            | CacheEvent::FetchedFromFetcher(keys)
            | CacheEvent::ClearedFromCache(keys)
            | CacheEvent::ErroredKeys(keys) => keys,
        }
    }

    /// Stable name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            CacheEvent::FetchedFromCache(_) => "fetched_from_cache",
            CacheEvent::FetchedFromFetcher(_) => "fetched_from_fetcher",
            CacheEvent::ClearedFromCache(_) => "cleared_from_cache",
            CacheEvent::ErroredKeys(_) => "errored_keys",
        }
    }

    fn deliver(&self, listener: &dyn CacheEventListener) -> ListenerResult {
        match self {
            CacheEvent::FetchedFromCache(keys) => listener.fetched_from_cache(keys),
            CacheEvent::FetchedFromFetcher(keys) => listener.fetched_from_fetcher(keys),
            CacheEvent::ClearedFromCache(keys) => listener.cleared_from_cache(keys),
            CacheEvent::ErroredKeys(keys) => listener.errored_keys(keys),
        }
    }
}

/// Event sink for cache activity.
///
/// All callbacks are optional. Implementations must be cheap; notification
/// is synchronous, so a listener that blocks, blocks the caller.
pub trait CacheEventListener: Send + Sync {
    fn fetched_from_cache(&self, _keys: &[String]) -> ListenerResult {
        Ok(())
    }

    fn fetched_from_fetcher(&self, _keys: &[String]) -> ListenerResult {
        Ok(())
    }

    fn cleared_from_cache(&self, _keys: &[String]) -> ListenerResult {
        Ok(())
    }

    fn errored_keys(&self, _keys: &[String]) -> ListenerResult {
        Ok(())
    }
}

/// Immutable list of listeners with isolated, sequential dispatch.
#[derive(Clone, Default)]
pub struct EventDispatcher {
    listeners: Arc<[Arc<dyn CacheEventListener>]>,
}

impl EventDispatcher {
    pub fn new(listeners: Vec<Arc<dyn CacheEventListener>>) -> Self {
        Self {
            listeners: listeners.into(),
        }
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Notify every listener. Events without keys are dropped.
    pub fn fire(&self, event: &CacheEvent) {
        if event.keys().is_empty() {
            return;
        }

        for listener in self.listeners.iter() {
            match catch_unwind(AssertUnwindSafe(|| event.deliver(listener.as_ref()))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(
                        event = event.name(),
                        error = %e,
                        "Exception occurred while handling a cache event"
                    );
                }
                Err(panic) => {
                    let panic_msg = if let Some(s) = panic.downcast_ref::<&str>() {
                        s.to_string()
                    } else if let Some(s) = panic.downcast_ref::<String>() {
                        s.clone()
                    } else {
                        "Unknown panic".to_string()
                    };
                    error!(
                        event = event.name(),
                        panic = %panic_msg,
                        "Listener panicked while handling a cache event"
                    );
                }
            }
        }
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
