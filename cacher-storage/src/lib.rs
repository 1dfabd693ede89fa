//! cacher storage - backend capability and reference backends
//!
//! Defines the [`CacheBackend`] capability the fetch layer reads and writes
//! through. Real deployments plug in a memcached or redis client; the
//! backends here cover local use, disabled caching and resilience wrappers.

pub mod memory;
pub mod null;
pub mod reconnecting;
pub mod timeout;
pub mod traits;

pub use memory::InMemoryBackend;
pub use null::{DisabledBackend, NullBackend};
pub use reconnecting::{BackendConnector, ConnectionListener, ReconnectingBackend};
pub use timeout::TimeoutBackend;
pub use traits::{BackendStats, CacheBackend};

pub use cacher_core::{BackendError, BackendResult, CachedValue};
