//! Transparent caching around an async operation.
//!
//! A [`CachingDecorator`] wraps an [`Operation`] and a [`CachingPolicy`].
//! Each invocation derives the cache key(s) from the request, answers
//! from the cache what it can and runs the operation only for the rest:
//!
//! ```text
//! derive keys -> cache lookup -> [miss: strip keys -> invoke -> write back] -> return
//! ```
//!
//! Failures are sorted by origin. The operation's own errors reach the
//! caller unchanged and the operation never runs twice for one call.
//! Type mismatches and configuration errors surface too. Anything else
//! going wrong in the caching machinery before the operation runs is
//! logged and the operation is invoked uncached with the original request.
//!
//! In batch mode cached entries are checked against `Output` as they are
//! read, so a wrong cached type stops the call before the operation runs.
//! `FetchedFromCache` fires for the hits before the key stripper runs; if
//! stripping then fails, the uncached fallback recomputes those keys anyway.

use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use cacher_core::{ConfigurationError, TypeMismatch};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Failure, FetchError, InvokeError};
use crate::fetcher::{FetchMultiple, FetchSingle};
use crate::manager::FetchManager;
use crate::policy::{CachingPolicy, FetchMode};
use crate::strategy::{json_kind, KeyStripper, OperationRequest};

/// An async operation whose results may be cached.
///
/// In batch mode `Output` must be a map keyed by the cache keys, e.g. a
/// `HashMap<String, V>`, so that it serializes to a JSON object.
#[async_trait]
pub trait Operation: Send + Sync {
    type Output: Serialize + DeserializeOwned + Send + Sync + 'static;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Name used in logs and configuration errors.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    async fn invoke(&self, request: &OperationRequest) -> Result<Self::Output, Self::Error>;
}

/// [`Operation`] backed by an async closure. See [`operation_fn`].
pub struct FnOperation<F, T, E> {
    name: String,
    f: F,
    _marker: PhantomData<fn() -> (T, E)>,
}

/// Wrap `f(request)` as a named operation.
pub fn operation_fn<F, Fut, T, E>(name: impl Into<String>, f: F) -> FnOperation<F, T, E>
where
    F: Fn(OperationRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, E>> + Send,
{
    FnOperation {
        name: name.into(),
        f,
        _marker: PhantomData,
    }
}

#[async_trait]
impl<F, Fut, T, E> Operation for FnOperation<F, T, E>
where
    F: Fn(OperationRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, E>> + Send,
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    type Output = T;
    type Error = E;

    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, request: &OperationRequest) -> Result<T, E> {
        (self.f)(request.clone()).await
    }
}

impl<F, T, E> std::fmt::Debug for FnOperation<F, T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnOperation")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Caches the results of an [`Operation`] according to a [`CachingPolicy`].
pub struct CachingDecorator<O> {
    manager: Arc<FetchManager>,
    policy: CachingPolicy,
    operation: O,
}

impl<O: Operation> CachingDecorator<O> {
    pub fn new(manager: Arc<FetchManager>, policy: CachingPolicy, operation: O) -> Self {
        Self {
            manager,
            policy,
            operation,
        }
    }

    pub fn operation(&self) -> &O {
        &self.operation
    }

    pub fn policy(&self) -> &CachingPolicy {
        &self.policy
    }

    /// Invoke the operation through the cache.
    pub async fn invoke(
        &self,
        request: &OperationRequest,
    ) -> Result<O::Output, InvokeError<O::Error>> {
        let outcome = match self.policy.mode() {
            FetchMode::Single => self.invoke_single(request).await,
            FetchMode::Batch => self.invoke_batch(request).await,
        };

        let failure = match outcome {
            Ok(output) => return Ok(output),
            Err(failure) => failure,
        };

        match failure.into_surfaced() {
            Ok(err) => Err(err),
            Err(reason) => {
                warn!(
                    operation = self.operation.name(),
                    reason = %reason,
                    "Caching failed, invoking operation without cache"
                );
                self.operation
                    .invoke(request)
                    .await
                    .map_err(InvokeError::Operation)
            }
        }
    }

    async fn invoke_single(
        &self,
        request: &OperationRequest,
    ) -> Result<O::Output, Failure<O::Error>> {
        let key = self
            .policy
            .key_deriver()
            .derive_key(request)
            .map_err(Failure::from_strategy)?;
        if key.is_empty() {
            return Err(Failure::internal("derived cache key is empty"));
        }

        let fetcher = SingleInvocation {
            operation: &self.operation,
            request,
        };
        match self
            .manager
            .fetch_single::<O::Output, _>(self.policy.group(), &key, &fetcher)
            .await
        {
            Ok(Some(output)) => Ok(output),
            Ok(None) => Err(Failure::internal("fetch produced no value")),
            Err(FetchError::TypeMismatch(e)) => Err(Failure::TypeMismatch(e)),
            Err(FetchError::Fetcher(failure)) => Err(failure),
        }
    }

    async fn invoke_batch(
        &self,
        request: &OperationRequest,
    ) -> Result<O::Output, Failure<O::Error>> {
        let keys = self
            .policy
            .key_deriver()
            .derive_keys(request)
            .map_err(Failure::from_strategy)?;

        let fetcher = BatchInvocation {
            operation: &self.operation,
            request,
            stripper: self.policy.key_stripper(),
            requested: keys.len(),
        };
        let merged = match self
            .manager
            .fetch_multiple::<BatchEntry<O::Output>, _>(self.policy.group(), &keys, &fetcher)
            .await
        {
            Ok(merged) => merged,
            Err(FetchError::TypeMismatch(e)) => {
                return Err(Failure::TypeMismatch(TypeMismatch {
                    expected: std::any::type_name::<O::Output>().to_string(),
                    ..e
                }))
            }
            Err(FetchError::Fetcher(failure)) => return Err(failure),
        };

        let merged: serde_json::Map<String, Value> =
            merged.into_iter().map(|(k, entry)| (k, entry.value)).collect();
        serde_json::from_value(Value::Object(merged))
            .map_err(|e| Failure::TypeMismatch(TypeMismatch::new::<O::Output>(keys.join(","), e)))
    }
}

impl<O: Operation> std::fmt::Debug for CachingDecorator<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachingDecorator")
            .field("operation", &self.operation.name())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// Runs the operation with its original arguments for a single-key miss.
struct SingleInvocation<'a, O> {
    operation: &'a O,
    request: &'a OperationRequest,
}

#[async_trait]
impl<'a, O: Operation> FetchSingle<O::Output> for SingleInvocation<'a, O> {
    type Error = Failure<O::Error>;

    async fn fetch(&self, _key: &str) -> Result<Option<O::Output>, Self::Error> {
        self.operation
            .invoke(self.request)
            .await
            .map(Some)
            .map_err(Failure::Operation)
    }
}

/// One value of a batch result, as stored in the cache.
///
/// Reading it back checks that it fits an entry of the batch output `O`.
struct BatchEntry<O> {
    value: Value,
    _output: PhantomData<fn() -> O>,
}

impl<O> BatchEntry<O> {
    fn new(value: Value) -> Self {
        Self {
            value,
            _output: PhantomData,
        }
    }
}

impl<O> Serialize for BatchEntry<O> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.value.serialize(serializer)
    }
}

impl<'de, O: DeserializeOwned> Deserialize<'de> for BatchEntry<O> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        // numeric-looking key so maps keyed by integers decode too
        let single = Value::Object(serde_json::Map::from_iter([(
            "0".to_string(),
            value.clone(),
        )]));
        O::deserialize(single).map_err(serde::de::Error::custom)?;
        Ok(Self::new(value))
    }
}

/// Runs the operation narrowed down to the missing keys of a batch.
struct BatchInvocation<'a, O> {
    operation: &'a O,
    request: &'a OperationRequest,
    stripper: &'a dyn KeyStripper,
    requested: usize,
}

#[async_trait]
impl<'a, O: Operation> FetchMultiple<BatchEntry<O::Output>> for BatchInvocation<'a, O> {
    type Error = Failure<O::Error>;

    async fn fetch(
        &self,
        missing: &[String],
    ) -> Result<HashMap<String, BatchEntry<O::Output>>, Self::Error> {
        let narrowed = self
            .stripper
            .strip_keys(self.request, missing)
            .map_err(Failure::from_strategy)?;

        debug!(
            operation = self.operation.name(),
            requested = self.requested,
            missing = missing.len(),
            "Invoking operation for uncached keys"
        );
        let output = self
            .operation
            .invoke(&narrowed)
            .await
            .map_err(Failure::Operation)?;

        match serde_json::to_value(&output) {
            Ok(Value::Object(values)) => Ok(values
                .into_iter()
                .map(|(k, v)| (k, BatchEntry::new(v)))
                .collect()),
            Ok(other) => Err(self.invalid_return(json_kind(&other))),
            Err(e) => Err(self.invalid_return(&format!("an unserializable value ({})", e))),
        }
    }
}

impl<'a, O: Operation> BatchInvocation<'a, O> {
    fn invalid_return(&self, found: &str) -> Failure<O::Error> {
        Failure::Configuration(ConfigurationError::InvalidBatchReturnType {
            operation: self.operation.name().to_string(),
            found: found.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cacher_storage::{CacheBackend, InMemoryBackend};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, thiserror::Error)]
    #[error("lookup failed")]
    struct LookupFailed;

    fn manager() -> (Arc<InMemoryBackend>, Arc<FetchManager>) {
        let backend = Arc::new(InMemoryBackend::new());
        let manager = Arc::new(FetchManager::new(backend.clone()));
        (backend, manager)
    }

    #[tokio::test]
    async fn test_single_mode_caches_result() {
        let (backend, manager) = manager();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let operation = operation_fn("describe", move |request: OperationRequest| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move {
                let id = request.get(0).cloned().unwrap_or(Value::Null);
                Ok::<_, LookupFailed>(format!("fruit {}", id))
            }
        });
        let decorator =
            CachingDecorator::new(manager, CachingPolicy::single().with_group("f:"), operation);
        let request = OperationRequest::new().key_arg(7);

        assert_eq!(decorator.invoke(&request).await.unwrap(), "fruit 7");
        assert_eq!(decorator.invoke(&request).await.unwrap(), "fruit 7");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(backend.get("f:7").await.unwrap(), Some(json!("fruit 7")));
    }

    #[tokio::test]
    async fn test_batch_mode_merges_hits_and_fetched() {
        let (backend, manager) = manager();
        backend.set("a", json!(1)).await.unwrap();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let recorder = seen.clone();
        let operation = operation_fn("lengths", move |request: OperationRequest| {
            recorder.lock().unwrap().push(request.clone());
            async move {
                let keys: Vec<String> =
                    serde_json::from_value(request.get(0).cloned().unwrap_or(Value::Null))
                        .unwrap_or_default();
                Ok::<_, LookupFailed>(
                    keys.into_iter()
                        .map(|k| {
                            let len = k.len() as u32;
                            (k, len)
                        })
                        .collect::<HashMap<String, u32>>(),
                )
            }
        });
        let decorator = CachingDecorator::new(manager, CachingPolicy::batch(), operation);

        let result = decorator
            .invoke(&OperationRequest::new().key_arg(json!(["a", "bb"])))
            .await
            .unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result["a"], 1);
        assert_eq!(result["bb"], 2);
        assert_eq!(seen.lock().unwrap()[0].get(0), Some(&json!(["bb"])));
    }

    #[tokio::test]
    async fn test_conversion_failure_falls_back_uncached() {
        let (backend, manager) = manager();
        let operation = operation_fn("echo", |_request: OperationRequest| async {
            Ok::<_, LookupFailed>(1u32)
        });
        let decorator = CachingDecorator::new(manager, CachingPolicy::single(), operation);

        let result = decorator
            .invoke(&OperationRequest::new().key_arg(Value::Null))
            .await
            .unwrap();

        assert_eq!(result, 1);
        assert!(backend.is_empty());
    }

    #[test]
    fn test_batch_entry_checks_value_type() {
        type Output = HashMap<String, u32>;

        let entry: BatchEntry<Output> = serde_json::from_value(json!(3)).unwrap();
        assert_eq!(entry.value, json!(3));
        assert_eq!(serde_json::to_value(&entry).unwrap(), json!(3));

        assert!(serde_json::from_value::<BatchEntry<Output>>(json!("three")).is_err());
        assert!(serde_json::from_value::<BatchEntry<HashMap<u64, u32>>>(json!(3)).is_ok());
    }
}
