//! Deadline enforcement for backends fronting a network cache.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use cacher_core::{millis, BackendError, BackendResult, CachedValue, CacherConfig};
use tracing::warn;

use crate::traits::CacheBackend;

/// Wraps a backend so no call blocks longer than the configured deadline.
///
/// An expired call fails with [`BackendError::Timeout`], which the fetch
/// layer treats like any other backend failure.
#[derive(Debug)]
pub struct TimeoutBackend<B> {
    inner: B,
    timeout: Option<Duration>,
}

impl<B: CacheBackend> TimeoutBackend<B> {
    /// A zero `timeout` disables the deadline.
    pub fn new(inner: B, timeout: Duration) -> Self {
        Self {
            inner,
            timeout: Some(timeout).filter(|t| !t.is_zero()),
        }
    }

    /// Build from `CacherConfig::request_timeout`; no deadline passes calls through.
    pub fn from_config(inner: B, config: &CacherConfig) -> Self {
        Self {
            inner,
            timeout: config.request_timeout(),
        }
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    async fn bounded<T, F>(&self, operation: &'static str, call: F) -> BackendResult<T>
    where
        F: Future<Output = BackendResult<T>> + Send,
    {
        let Some(timeout) = self.timeout else {
            return call.await;
        };

        match tokio::time::timeout(timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                let timeout_ms = millis(timeout);
                warn!(operation, timeout_ms, "Backend call exceeded its deadline");
                Err(BackendError::Timeout { timeout_ms })
            }
        }
    }
}

#[async_trait]
impl<B: CacheBackend> CacheBackend for TimeoutBackend<B> {
    async fn get(&self, key: &str) -> BackendResult<Option<CachedValue>> {
        self.bounded("get", self.inner.get(key)).await
    }

    async fn get_bulk(&self, keys: &[String]) -> BackendResult<HashMap<String, CachedValue>> {
        self.bounded("get_bulk", self.inner.get_bulk(keys)).await
    }

    async fn set(&self, key: &str, value: CachedValue) -> BackendResult<()> {
        self.bounded("set", self.inner.set(key, value)).await
    }

    async fn remove(&self, key: &str) -> BackendResult<()> {
        self.bounded("remove", self.inner.remove(key)).await
    }

    async fn clear(&self) -> BackendResult<()> {
        self.bounded("clear", self.inner.clear()).await
    }
}
