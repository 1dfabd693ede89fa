//! cacher core - shared types
//!
//! Error taxonomy, key addressing, cache events and configuration. Every
//! other crate in the workspace depends on this one; it holds no I/O.

pub mod config;
pub mod error;
pub mod event;
pub mod key;

pub use config::{millis, CacherConfig};
pub use error::{
    BackendError, BackendResult, CacherError, CacherResult, ConfigError, ConfigurationError,
    ListenerError, StrategyError, TypeMismatch,
};
pub use event::{CacheEvent, CacheEventListener, EventDispatcher, ListenerResult};
pub use key::{addressed_key, addressed_keys, normalize_group};

/// Value representation stored by every backend.
pub type CachedValue = serde_json::Value;
