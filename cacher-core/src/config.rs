//! Configuration types

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{CacherError, CacherResult, ConfigError};

const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 500;
const DEFAULT_RECONNECT_BACKOFF_MS: u64 = 5_000;

/// Runtime knobs for the backend wrappers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacherConfig {
    /// Deadline for a single backend call in milliseconds; `None` disables it.
    pub request_timeout_ms: Option<u64>,
    /// Minimum delay between reconnect attempts after a broken connection.
    pub reconnect_backoff_ms: u64,
}

impl Default for CacherConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: Some(DEFAULT_REQUEST_TIMEOUT_MS),
            reconnect_backoff_ms: DEFAULT_RECONNECT_BACKOFF_MS,
        }
    }
}

impl CacherConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read overrides from `CACHER_REQUEST_TIMEOUT_MS` and
    /// `CACHER_RECONNECT_BACKOFF_MS`. Unparsable values keep the default;
    /// a timeout of `0` or `off` disables the deadline.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(raw) = std::env::var("CACHER_REQUEST_TIMEOUT_MS") {
            match raw.trim() {
                "0" | "off" | "none" => config.request_timeout_ms = None,
                value => {
                    if let Ok(ms) = value.parse() {
                        config.request_timeout_ms = Some(ms);
                    }
                }
            }
        }

        if let Some(ms) = std::env::var("CACHER_RECONNECT_BACKOFF_MS")
            .ok()
            .and_then(|s| s.trim().parse().ok())
        {
            config.reconnect_backoff_ms = ms;
        }

        config
    }

    /// Set the backend request timeout. A zero duration disables it.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = Some(millis(timeout)).filter(|ms| *ms > 0);
        self
    }

    /// Disable the backend request timeout.
    pub fn without_request_timeout(mut self) -> Self {
        self.request_timeout_ms = None;
        self
    }

    /// Set the reconnect backoff.
    pub fn with_reconnect_backoff(mut self, backoff: Duration) -> Self {
        self.reconnect_backoff_ms = millis(backoff);
        self
    }

    /// The backend request deadline. `Some(0)` means no deadline, as it
    /// does for `CACHER_REQUEST_TIMEOUT_MS=0`.
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }

    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_millis(self.reconnect_backoff_ms)
    }

    /// Validate the configuration.
    ///
    /// A configured request timeout must be positive.
    pub fn validate(&self) -> CacherResult<()> {
        if self.request_timeout_ms == Some(0) {
            return Err(CacherError::Config(ConfigError::InvalidValue {
                field: "request_timeout_ms".to_string(),
                value: "0".to_string(),
                reason: "request_timeout_ms must be positive when set".to_string(),
            }));
        }

        Ok(())
    }
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`.
pub fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
