//! cacher fetch - cache-aside orchestration
//!
//! [`FetchManager`] answers reads from a [`CacheBackend`](cacher_storage::CacheBackend)
//! and falls back to a fetcher for misses. [`CachingDecorator`] applies the
//! same flow to an arbitrary async [`Operation`], deriving keys from its
//! arguments. [`Cleaner`] and [`RevokeManager`] take keys back out.

pub mod cleaner;
pub mod decorator;
pub mod error;
pub mod fetcher;
pub mod manager;
pub mod policy;
pub mod revoker;
pub mod strategy;

pub use cleaner::{CleanReport, Cleaner};
pub use decorator::{operation_fn, CachingDecorator, FnOperation, Operation};
pub use error::{Failure, FetchError, InvokeError, Origin};
pub use fetcher::{multiple_fn, single_fn, FetchMultiple, FetchSingle, MultipleFn, OneAtATime, SingleFn};
pub use manager::FetchManager;
pub use policy::{CachingPolicy, FetchMode};
pub use revoker::RevokeManager;
pub use strategy::{
    Argument, DefaultKeyDeriver, DefaultKeyStripper, KeyDeriver, KeyStripper, OperationRequest,
    UnsupportedKeyStripper,
};

pub use cacher_core::{CacheEvent, CacheEventListener, CachedValue, TypeMismatch};
