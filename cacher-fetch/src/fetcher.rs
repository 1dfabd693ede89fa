//! Fetchers compute values the cache does not have.
//!
//! A fetcher knows how to read the primary data store. Its errors are
//! never interpreted by the cache layer; they reach the caller untouched.

use std::collections::HashMap;
use std::future::Future;

use async_trait::async_trait;

/// Fetches a single data point from the primary data store.
#[async_trait]
pub trait FetchSingle<T: Send + 'static>: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// `Ok(None)` means the value legitimately does not exist.
    async fn fetch(&self, key: &str) -> Result<Option<T>, Self::Error>;
}

/// Fetches several data points at once (bulk fetch).
#[async_trait]
pub trait FetchMultiple<T: Send + 'static>: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Keys with no value are simply left out of the map.
    async fn fetch(&self, keys: &[String]) -> Result<HashMap<String, T>, Self::Error>;
}

/// Bulk fetcher built from a single-key fetcher, one key at a time.
///
/// For data stores that have no batch read. The first failing key aborts
/// the whole fetch.
#[derive(Debug, Clone)]
pub struct OneAtATime<F>(pub F);

#[async_trait]
impl<T, F> FetchMultiple<T> for OneAtATime<F>
where
    T: Send + 'static,
    F: FetchSingle<T>,
{
    type Error = F::Error;

    async fn fetch(&self, keys: &[String]) -> Result<HashMap<String, T>, Self::Error> {
        let mut results = HashMap::with_capacity(keys.len());
        for key in keys {
            if let Some(value) = self.0.fetch(key).await? {
                results.insert(key.clone(), value);
            }
        }
        Ok(results)
    }
}

/// [`FetchSingle`] backed by an async closure. See [`single_fn`].
#[derive(Debug, Clone)]
pub struct SingleFn<F>(F);

/// Wrap `f(key)` as a single-key fetcher.
pub fn single_fn<F>(f: F) -> SingleFn<F> {
    SingleFn(f)
}

#[async_trait]
impl<T, E, F, Fut> FetchSingle<T> for SingleFn<F>
where
    T: Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Option<T>, E>> + Send,
{
    type Error = E;

    async fn fetch(&self, key: &str) -> Result<Option<T>, E> {
        (self.0)(key.to_string()).await
    }
}

/// [`FetchMultiple`] backed by an async closure. See [`multiple_fn`].
#[derive(Debug, Clone)]
pub struct MultipleFn<F>(F);

/// Wrap `f(keys)` as a bulk fetcher.
pub fn multiple_fn<F>(f: F) -> MultipleFn<F> {
    MultipleFn(f)
}

#[async_trait]
impl<T, E, F, Fut> FetchMultiple<T> for MultipleFn<F>
where
    T: Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
    F: Fn(Vec<String>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<HashMap<String, T>, E>> + Send,
{
    type Error = E;

    async fn fetch(&self, keys: &[String]) -> Result<HashMap<String, T>, E> {
        (self.0)(keys.to_vec()).await
    }
}
