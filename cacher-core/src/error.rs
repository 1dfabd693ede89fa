//! Error types for cacher operations

use thiserror::Error;

/// Backend capability errors.
///
/// These are resilience-isolated by the fetch layer: logged and degraded to
/// "nothing cached", never surfaced to callers of a fetch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("Backend unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Backend request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Caching is not supported: {operation}")]
    NotSupported { operation: String },

    #[error("Serialization failed for key {key}: {reason}")]
    Serialization { key: String, reason: String },
}

impl BackendError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }
}

/// A cached value could not be read as the type the caller declared.
///
/// Signals cache corruption or a key collision, so it always surfaces.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Cached value for key {key} cannot be read as {expected}: {reason}")]
pub struct TypeMismatch {
    pub key: String,
    pub expected: String,
    pub reason: String,
}

impl TypeMismatch {
    pub fn new<T: ?Sized>(key: impl Into<String>, reason: impl ToString) -> Self {
        Self {
            key: key.into(),
            expected: std::any::type_name::<T>().to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Misconfigured caching of an operation. Fails fast, never falls back.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("No key carrier argument was designated; exactly one is required")]
    NoKeyDesignated,

    #[error("Multiple key carrier arguments were designated at positions {positions:?}; exactly one is required")]
    AmbiguousKeyDesignation { positions: Vec<usize> },

    #[error("Batch operation {operation} must return a map of string keys to values, got {found}")]
    InvalidBatchReturnType { operation: String, found: String },
}

/// Key strategy failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StrategyError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("Unable to convert key argument at position {position}: {reason}")]
    KeyConversion { position: usize, reason: String },

    #[error("Key strategy {strategy} is not supported for this operation")]
    Unsupported { strategy: String },

    #[error("Key strategy failed: {reason}")]
    Failed { reason: String },
}

/// Configuration validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Failure reported by an event listener.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Listener failed: {reason}")]
pub struct ListenerError {
    pub reason: String,
}

impl ListenerError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Master error type for all cacher errors.
#[derive(Debug, Clone, Error)]
pub enum CacherError {
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Type mismatch: {0}")]
    TypeMismatch(#[from] TypeMismatch),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Strategy error: {0}")]
    Strategy(#[from] StrategyError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Listener error: {0}")]
    Listener(#[from] ListenerError),
}

/// Result type alias for cacher operations.
pub type CacherResult<T> = Result<T, CacherError>;

/// Result type alias for backend capability calls.
pub type BackendResult<T> = Result<T, BackendError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_display_timeout() {
        let err = BackendError::Timeout { timeout_ms: 250 };
        let msg = format!("{}", err);
        assert!(msg.contains("timed out"));
        assert!(msg.contains("250"));
    }

    #[test]
    fn test_type_mismatch_names_expected_type() {
        let err = TypeMismatch::new::<String>("apple-1", "invalid type: map");
        assert_eq!(err.key, "apple-1");
        assert!(err.expected.contains("String"));
        let msg = format!("{}", err);
        assert!(msg.contains("apple-1"));
        assert!(msg.contains("invalid type: map"));
    }

    #[test]
    fn test_configuration_error_display_ambiguous() {
        let err = ConfigurationError::AmbiguousKeyDesignation {
            positions: vec![0, 2],
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Multiple key carrier"));
        assert!(msg.contains("[0, 2]"));
    }

    #[test]
    fn test_strategy_error_is_transparent_over_configuration() {
        let err: StrategyError = ConfigurationError::NoKeyDesignated.into();
        assert_eq!(
            format!("{}", err),
            format!("{}", ConfigurationError::NoKeyDesignated)
        );
    }

    #[test]
    fn test_cacher_error_from_conversions() {
        let err: CacherError = BackendError::unavailable("connection refused").into();
        assert!(matches!(err, CacherError::Backend(_)));
        assert!(format!("{}", err).contains("connection refused"));

        let err: CacherError = ListenerError::new("boom").into();
        assert!(matches!(err, CacherError::Listener(_)));
    }
}
