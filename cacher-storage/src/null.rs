//! Backends that cache nothing.

use std::collections::HashMap;

use async_trait::async_trait;
use cacher_core::{BackendError, BackendResult, CachedValue};
use tracing::debug;

use crate::traits::CacheBackend;

/// Accepts every call and caches nothing.
///
/// Used while caching is disabled or a remote backend is unreachable:
/// reads always miss and writes vanish.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullBackend;

impl NullBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CacheBackend for NullBackend {
    async fn get(&self, key: &str) -> BackendResult<Option<CachedValue>> {
        debug!(key, "caching disabled, get ignored");
        Ok(None)
    }

    async fn get_bulk(&self, keys: &[String]) -> BackendResult<HashMap<String, CachedValue>> {
        debug!(keys = ?keys, "caching disabled, get_bulk ignored");
        Ok(HashMap::new())
    }

    async fn set(&self, key: &str, _value: CachedValue) -> BackendResult<()> {
        debug!(key, "caching disabled, set ignored");
        Ok(())
    }

    async fn remove(&self, key: &str) -> BackendResult<()> {
        debug!(key, "caching disabled, remove ignored");
        Ok(())
    }

    async fn clear(&self) -> BackendResult<()> {
        debug!("caching disabled, clear ignored");
        Ok(())
    }
}

/// Fails every call with [`BackendError::NotSupported`].
///
/// Useful in tests that must prove a code path never touches the cache,
/// and for exercising the fetch layer's degraded mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledBackend;

impl DisabledBackend {
    pub fn new() -> Self {
        Self
    }
}

fn not_supported(operation: &str) -> BackendError {
    BackendError::NotSupported {
        operation: operation.to_string(),
    }
}

#[async_trait]
impl CacheBackend for DisabledBackend {
    async fn get(&self, _key: &str) -> BackendResult<Option<CachedValue>> {
        Err(not_supported("get"))
    }

    async fn get_bulk(&self, _keys: &[String]) -> BackendResult<HashMap<String, CachedValue>> {
        Err(not_supported("get_bulk"))
    }

    async fn set(&self, _key: &str, _value: CachedValue) -> BackendResult<()> {
        Err(not_supported("set"))
    }

    async fn remove(&self, _key: &str) -> BackendResult<()> {
        Err(not_supported("remove"))
    }

    async fn clear(&self) -> BackendResult<()> {
        Err(not_supported("clear"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_null_backend_never_caches() {
        let backend = NullBackend::new();
        backend.set("k", json!(1)).await.unwrap();

        assert_eq!(backend.get("k").await.unwrap(), None);
        assert!(backend
            .get_bulk(&["k".to_string()])
            .await
            .unwrap()
            .is_empty());
        assert!(backend.remove("k").await.is_ok());
        assert!(backend.clear().await.is_ok());
    }

    #[tokio::test]
    async fn test_disabled_backend_fails_every_call() {
        let backend = DisabledBackend::new();

        assert!(matches!(
            backend.get("k").await,
            Err(BackendError::NotSupported { .. })
        ));
        assert!(backend.get_bulk(&[]).await.is_err());
        assert!(backend.set("k", json!(1)).await.is_err());
        assert!(backend.remove("k").await.is_err());

        let err = backend.clear().await.unwrap_err();
        assert!(format!("{}", err).contains("clear"));
    }
}
