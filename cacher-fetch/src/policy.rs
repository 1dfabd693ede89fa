//! Per-operation caching configuration.

use std::sync::Arc;

use cacher_core::normalize_group;

use crate::strategy::{DefaultKeyDeriver, DefaultKeyStripper, KeyDeriver, KeyStripper};

/// How a decorated operation maps onto the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// One key in, one value out.
    Single,
    /// A list of keys in, a map of key to value out.
    Batch,
}

/// Caching policy registered for one operation.
///
/// ```
/// use cacher_fetch::{CachingPolicy, FetchMode, UnsupportedKeyStripper};
///
/// let policy = CachingPolicy::batch()
///     .with_group("pear:")
///     .with_key_stripper(UnsupportedKeyStripper);
/// assert_eq!(policy.mode(), FetchMode::Batch);
/// assert_eq!(policy.group(), Some("pear:"));
/// ```
#[derive(Clone)]
pub struct CachingPolicy {
    mode: FetchMode,
    group: Option<String>,
    key_deriver: Arc<dyn KeyDeriver>,
    key_stripper: Arc<dyn KeyStripper>,
}

impl CachingPolicy {
    fn with_mode(mode: FetchMode) -> Self {
        Self {
            mode,
            group: None,
            key_deriver: Arc::new(DefaultKeyDeriver),
            key_stripper: Arc::new(DefaultKeyStripper),
        }
    }

    pub fn single() -> Self {
        Self::with_mode(FetchMode::Single)
    }

    pub fn batch() -> Self {
        Self::with_mode(FetchMode::Batch)
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn with_key_deriver(mut self, deriver: impl KeyDeriver + 'static) -> Self {
        self.key_deriver = Arc::new(deriver);
        self
    }

    pub fn with_key_stripper(mut self, stripper: impl KeyStripper + 'static) -> Self {
        self.key_stripper = Arc::new(stripper);
        self
    }

    pub fn mode(&self) -> FetchMode {
        self.mode
    }

    /// Configured group; an empty group reads as none.
    pub fn group(&self) -> Option<&str> {
        normalize_group(self.group.as_deref())
    }

    pub fn key_deriver(&self) -> &dyn KeyDeriver {
        self.key_deriver.as_ref()
    }

    pub fn key_stripper(&self) -> &dyn KeyStripper {
        self.key_stripper.as_ref()
    }
}

impl std::fmt::Debug for CachingPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachingPolicy")
            .field("mode", &self.mode)
            .field("group", &self.group)
            .finish_non_exhaustive()
    }
}
