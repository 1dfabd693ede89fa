//! Keeps the system stable while a remote cache is unreachable.
//!
//! `ReconnectingBackend` owns a [`BackendConnector`] that knows how to
//! build a connected backend. While no connection is available it answers
//! like [`NullBackend`]: reads miss, writes vanish. Any failure from the
//! connected backend drops the connection and the failing call is answered
//! the same way. Reconnects are attempted on later calls once the backoff
//! has elapsed. Only one call connects at a time, and no lock is held while
//! it does, so concurrent calls keep getting null-mode answers meanwhile.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use cacher_core::{BackendError, BackendResult, CachedValue, CacherConfig};
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use crate::null::NullBackend;
use crate::traits::CacheBackend;

/// Creates a connected backend instance.
#[async_trait]
pub trait BackendConnector: Send + Sync {
    async fn connect(&self) -> BackendResult<Arc<dyn CacheBackend>>;
}

/// Observes connections being established and broken.
pub trait ConnectionListener: Send + Sync {
    fn connection_established(&self) {}

    fn connection_broken(&self, _error: &BackendError) {}
}

#[derive(Default)]
struct ConnectionState {
    backend: Option<Arc<dyn CacheBackend>>,
    last_failure: Option<Instant>,
}

/// Backend wrapper that degrades to null mode on failure.
pub struct ReconnectingBackend<C> {
    connector: C,
    backoff: Duration,
    state: RwLock<ConnectionState>,
    connecting: AtomicBool,
    listeners: Vec<Arc<dyn ConnectionListener>>,
    fallback: NullBackend,
}

/// Exclusive right to attempt a connection, released on drop.
struct ConnectAttempt<'a>(&'a AtomicBool);

impl<'a> ConnectAttempt<'a> {
    fn claim(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for ConnectAttempt<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<C: BackendConnector> ReconnectingBackend<C> {
    /// Create the wrapper and make the first connection attempt.
    pub async fn connect(connector: C, config: &CacherConfig) -> Self {
        Self::connect_with_listeners(connector, config, Vec::new()).await
    }

    pub async fn connect_with_listeners(
        connector: C,
        config: &CacherConfig,
        listeners: Vec<Arc<dyn ConnectionListener>>,
    ) -> Self {
        let backend = Self {
            connector,
            backoff: config.reconnect_backoff(),
            state: RwLock::new(ConnectionState::default()),
            connecting: AtomicBool::new(false),
            listeners,
            fallback: NullBackend::new(),
        };
        backend.establish_connection().await;
        backend
    }

    /// Whether calls are currently answered by the null fallback.
    pub async fn is_null_mode(&self) -> bool {
        self.state.read().await.backend.is_none()
    }

    /// The connected backend, if any.
    pub async fn service_backend(&self) -> Option<Arc<dyn CacheBackend>> {
        self.state.read().await.backend.clone()
    }

    /// Return a connected backend, connecting first if allowed.
    ///
    /// Returns `None` without waiting while another call is connecting.
    async fn establish_connection(&self) -> Option<Arc<dyn CacheBackend>> {
        {
            let state = self.state.read().await;
            if let Some(backend) = &state.backend {
                return Some(Arc::clone(backend));
            }
            if let Some(failed_at) = state.last_failure {
                if failed_at.elapsed() < self.backoff {
                    return None;
                }
            }
        }

        let Some(_attempt) = ConnectAttempt::claim(&self.connecting) else {
            debug!("Reconnect already in progress, answering from null mode");
            return None;
        };
        // a concurrent attempt may have finished before we claimed ours
        if let Some(backend) = self.state.read().await.backend.clone() {
            return Some(backend);
        }

        match self.connector.connect().await {
            Ok(backend) => {
                info!("Connection to remote cache established");
                {
                    let mut state = self.state.write().await;
                    state.backend = Some(Arc::clone(&backend));
                    state.last_failure = None;
                }
                for listener in &self.listeners {
                    listener.connection_established();
                }
                Some(backend)
            }
            Err(e) => {
                self.state.write().await.last_failure = Some(Instant::now());
                self.notify_broken(&e);
                None
            }
        }
    }

    /// Switch to null mode after `failed` reported `err`.
    ///
    /// A failure from a connection that has already been replaced is ignored.
    async fn broken_connection(&self, failed: &Arc<dyn CacheBackend>, err: &BackendError) {
        {
            let mut state = self.state.write().await;
            let current = state
                .backend
                .as_ref()
                .is_some_and(|backend| Arc::ptr_eq(backend, failed));
            if !current {
                debug!(error = %err, "Ignoring failure from a replaced connection");
                return;
            }
            state.backend = None;
            state.last_failure = Some(Instant::now());
        }
        self.notify_broken(err);
    }

    fn notify_broken(&self, err: &BackendError) {
        error!(error = %err, "Remote cache connection broken, caching disabled");
        for listener in &self.listeners {
            listener.connection_broken(err);
        }
    }
}

#[async_trait]
impl<C: BackendConnector> CacheBackend for ReconnectingBackend<C> {
    async fn get(&self, key: &str) -> BackendResult<Option<CachedValue>> {
        if let Some(backend) = self.establish_connection().await {
            match backend.get(key).await {
                Ok(value) => return Ok(value),
                Err(e) => self.broken_connection(&backend, &e).await,
            }
        }
        self.fallback.get(key).await
    }

    async fn get_bulk(&self, keys: &[String]) -> BackendResult<HashMap<String, CachedValue>> {
        if let Some(backend) = self.establish_connection().await {
            match backend.get_bulk(keys).await {
                Ok(values) => return Ok(values),
                Err(e) => self.broken_connection(&backend, &e).await,
            }
        }
        self.fallback.get_bulk(keys).await
    }

    async fn set(&self, key: &str, value: CachedValue) -> BackendResult<()> {
        if let Some(backend) = self.establish_connection().await {
            match backend.set(key, value.clone()).await {
                Ok(()) => return Ok(()),
                Err(e) => self.broken_connection(&backend, &e).await,
            }
        }
        self.fallback.set(key, value).await
    }

    async fn remove(&self, key: &str) -> BackendResult<()> {
        if let Some(backend) = self.establish_connection().await {
            match backend.remove(key).await {
                Ok(()) => return Ok(()),
                Err(e) => self.broken_connection(&backend, &e).await,
            }
        }
        self.fallback.remove(key).await
    }

    async fn clear(&self) -> BackendResult<()> {
        if let Some(backend) = self.establish_connection().await {
            match backend.clear().await {
                Ok(()) => return Ok(()),
                Err(e) => self.broken_connection(&backend, &e).await,
            }
        }
        self.fallback.clear().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryBackend;
    use crate::null::DisabledBackend;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    struct ToggleConnector {
        reachable: AtomicBool,
        attempts: AtomicUsize,
        delay: Duration,
        backend: Arc<InMemoryBackend>,
    }

    impl ToggleConnector {
        fn new(reachable: bool) -> Self {
            Self::slow(reachable, Duration::ZERO)
        }

        fn slow(reachable: bool, delay: Duration) -> Self {
            Self {
                reachable: AtomicBool::new(reachable),
                attempts: AtomicUsize::new(0),
                delay,
                backend: Arc::new(InMemoryBackend::new()),
            }
        }
    }

    #[async_trait]
    impl BackendConnector for Arc<ToggleConnector> {
        async fn connect(&self) -> BackendResult<Arc<dyn CacheBackend>> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.reachable.load(Ordering::SeqCst) {
                let backend: Arc<dyn CacheBackend> = self.backend.clone();
                Ok(backend)
            } else {
                Err(BackendError::unavailable("connection refused"))
            }
        }
    }

    struct BrokenConnector;

    #[async_trait]
    impl BackendConnector for BrokenConnector {
        async fn connect(&self) -> BackendResult<Arc<dyn CacheBackend>> {
            Ok(Arc::new(DisabledBackend::new()))
        }
    }

    #[derive(Default)]
    struct CountingListener {
        established: AtomicUsize,
        broken: AtomicUsize,
    }

    impl ConnectionListener for CountingListener {
        fn connection_established(&self) {
            self.established.fetch_add(1, Ordering::SeqCst);
        }

        fn connection_broken(&self, _error: &BackendError) {
            self.broken.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn no_backoff() -> CacherConfig {
        CacherConfig::new().with_reconnect_backoff(Duration::ZERO)
    }

    #[tokio::test]
    async fn test_connected_calls_reach_remote() {
        let connector = Arc::new(ToggleConnector::new(true));
        let backend = ReconnectingBackend::connect(connector.clone(), &no_backoff()).await;

        backend.set("k", json!("v")).await.unwrap();
        assert_eq!(backend.get("k").await.unwrap(), Some(json!("v")));
        assert!(!backend.is_null_mode().await);
        assert_eq!(connector.backend.len(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_remote_answers_as_null() {
        let connector = Arc::new(ToggleConnector::new(false));
        let backend = ReconnectingBackend::connect(connector.clone(), &no_backoff()).await;

        assert!(backend.is_null_mode().await);
        backend.set("k", json!("v")).await.unwrap();
        assert_eq!(backend.get("k").await.unwrap(), None);

        connector.reachable.store(true, Ordering::SeqCst);
        backend.set("k", json!("v")).await.unwrap();
        assert_eq!(backend.get("k").await.unwrap(), Some(json!("v")));
        assert!(backend.service_backend().await.is_some());
    }

    #[tokio::test]
    async fn test_failure_flips_to_null_mode_and_notifies() {
        let listener = Arc::new(CountingListener::default());
        let backend = ReconnectingBackend::connect_with_listeners(
            BrokenConnector,
            &CacherConfig::new().with_reconnect_backoff(Duration::from_secs(60)),
            vec![listener.clone()],
        )
        .await;
        assert_eq!(listener.established.load(Ordering::SeqCst), 1);

        assert_eq!(backend.get("k").await.unwrap(), None);
        assert!(backend.is_null_mode().await);
        assert_eq!(listener.broken.load(Ordering::SeqCst), 1);

        // within the backoff window no reconnect is attempted
        assert!(backend.get_bulk(&["k".to_string()]).await.unwrap().is_empty());
        assert_eq!(listener.established.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_backoff_limits_connect_attempts() {
        let connector = Arc::new(ToggleConnector::new(false));
        let config = CacherConfig::new().with_reconnect_backoff(Duration::from_secs(60));
        let backend = ReconnectingBackend::connect(connector.clone(), &config).await;

        for _ in 0..5 {
            let _ = backend.get("k").await;
        }
        assert_eq!(connector.attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_calls_during_reconnect_answer_as_null_without_waiting() {
        let connector = Arc::new(ToggleConnector::slow(false, Duration::from_millis(300)));
        let backend = ReconnectingBackend::connect(connector.clone(), &no_backoff()).await;
        assert!(backend.is_null_mode().await);
        connector.reachable.store(true, Ordering::SeqCst);
        connector.backend.set("k", json!("remote")).await.unwrap();

        let (reconnecting, concurrent) = tokio::join!(backend.get("k"), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let started = Instant::now();
            let value = backend.get("k").await;
            (value, started.elapsed())
        });

        assert_eq!(reconnecting.unwrap(), Some(json!("remote")));
        assert_eq!(concurrent.0.unwrap(), None);
        assert!(concurrent.1 < Duration::from_millis(100));
        assert_eq!(connector.attempts.load(Ordering::SeqCst), 2);
        assert!(!backend.is_null_mode().await);
    }

    #[tokio::test]
    async fn test_failure_from_replaced_connection_is_ignored() {
        let listener = Arc::new(CountingListener::default());
        let connector = Arc::new(ToggleConnector::new(true));
        let backend = ReconnectingBackend::connect_with_listeners(
            connector.clone(),
            &no_backoff(),
            vec![listener.clone()],
        )
        .await;

        let stale: Arc<dyn CacheBackend> = Arc::new(DisabledBackend::new());
        backend
            .broken_connection(&stale, &BackendError::unavailable("old socket closed"))
            .await;

        assert!(!backend.is_null_mode().await);
        assert_eq!(listener.broken.load(Ordering::SeqCst), 0);

        let current = backend.service_backend().await.unwrap();
        backend
            .broken_connection(&current, &BackendError::unavailable("reset"))
            .await;
        assert!(backend.is_null_mode().await);
        assert_eq!(listener.broken.load(Ordering::SeqCst), 1);
    }
}
