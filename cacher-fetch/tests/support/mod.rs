//! Fetcher and operation doubles shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use cacher_fetch::{FetchMultiple, FetchSingle, Operation, OperationRequest};
use cacher_test_utils::{Apple, Pear};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("data source failed: {0}")]
pub struct SourceError(pub String);

/// Fetcher over a fixed map, recording every key list it is asked for.
pub struct MapFetcher<T> {
    source: HashMap<String, T>,
    requests: Mutex<Vec<Vec<String>>>,
    fail: bool,
}

impl<T: Clone> MapFetcher<T> {
    pub fn new<K: Into<String>>(entries: impl IntoIterator<Item = (K, T)>) -> Self {
        Self {
            source: entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            requests: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            source: HashMap::new(),
            requests: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn requests(&self) -> Vec<Vec<String>> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn lookup(&self, keys: &[String]) -> Result<HashMap<String, T>, SourceError> {
        self.requests.lock().unwrap().push(keys.to_vec());
        if self.fail {
            return Err(SourceError(format!("cannot load {:?}", keys)));
        }
        Ok(keys
            .iter()
            .filter_map(|k| self.source.get(k).map(|v| (k.clone(), v.clone())))
            .collect())
    }
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> FetchSingle<T> for MapFetcher<T> {
    type Error = SourceError;

    async fn fetch(&self, key: &str) -> Result<Option<T>, SourceError> {
        Ok(self.lookup(&[key.to_string()])?.remove(key))
    }
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> FetchMultiple<T> for MapFetcher<T> {
    type Error = SourceError;

    async fn fetch(&self, keys: &[String]) -> Result<HashMap<String, T>, SourceError> {
        self.lookup(keys)
    }
}

/// Single-key operation loading an `Apple` by the key argument.
#[derive(Default)]
pub struct AppleLookup {
    pub calls: AtomicUsize,
    pub requests: Mutex<Vec<OperationRequest>>,
    pub fail: bool,
}

impl AppleLookup {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Operation for AppleLookup {
    type Output = Apple;
    type Error = SourceError;

    fn name(&self) -> &str {
        "apple_lookup"
    }

    async fn invoke(&self, request: &OperationRequest) -> Result<Apple, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        if self.fail {
            return Err(SourceError("apple store offline".to_string()));
        }
        let id = request
            .arguments()
            .iter()
            .find(|a| a.is_key_carrier())
            .map(|a| match a.value() {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_default();
        Ok(Apple::new(id))
    }
}

/// Batch operation loading pears for a list of ids.
#[derive(Default)]
pub struct PearBatch {
    pub requests: Mutex<Vec<OperationRequest>>,
    pub fail: bool,
}

impl PearBatch {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn requests(&self) -> Vec<OperationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Operation for PearBatch {
    type Output = HashMap<String, Pear>;
    type Error = SourceError;

    fn name(&self) -> &str {
        "pear_batch"
    }

    async fn invoke(&self, request: &OperationRequest) -> Result<Self::Output, SourceError> {
        self.requests.lock().unwrap().push(request.clone());
        if self.fail {
            return Err(SourceError("pear store offline".to_string()));
        }
        let ids = request
            .arguments()
            .iter()
            .find(|a| a.is_key_carrier())
            .and_then(|a| a.value().as_array().cloned())
            .unwrap_or_default();
        Ok(ids
            .iter()
            .filter_map(Value::as_str)
            .filter_map(|id| {
                let n = id.parse::<u64>().ok()?;
                Some((id.to_string(), Pear { id: n, ripe: n % 2 == 0 }))
            })
            .collect())
    }
}

/// Batch operation whose result is a list, not a map.
#[derive(Default)]
pub struct ListBatch {
    pub calls: AtomicUsize,
}

#[async_trait]
impl Operation for ListBatch {
    type Output = Vec<String>;
    type Error = SourceError;

    fn name(&self) -> &str {
        "list_batch"
    }

    async fn invoke(&self, _request: &OperationRequest) -> Result<Vec<String>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec!["a".to_string()])
    }
}

pub fn keys(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}
