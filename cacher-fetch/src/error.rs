//! Error types surfaced by fetches and decorated operations.

use cacher_core::{ConfigurationError, StrategyError, TypeMismatch};
use thiserror::Error;

/// Error from [`FetchManager`](crate::FetchManager) calls.
///
/// Backend failures never appear here; they are logged and degrade to a
/// miss or a skipped write.
#[derive(Debug, Error)]
pub enum FetchError<E> {
    /// A cached value does not have the declared type.
    #[error(transparent)]
    TypeMismatch(#[from] TypeMismatch),

    /// The fetcher failed. Carried unaltered.
    #[error(transparent)]
    Fetcher(E),
}

impl<E> FetchError<E> {
    pub fn is_type_mismatch(&self) -> bool {
        matches!(self, FetchError::TypeMismatch(_))
    }

    /// The fetcher's own error, if that is what failed.
    pub fn into_fetcher_error(self) -> Option<E> {
        match self {
            FetchError::Fetcher(e) => Some(e),
            FetchError::TypeMismatch(_) => None,
        }
    }
}

/// Where a decorator failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// The wrapped operation itself failed.
    Operation,
    /// The caching machinery around it failed.
    Internal,
}

/// Failure inside a decorated invocation, tagged by origin.
#[derive(Debug, Error)]
pub enum Failure<E> {
    #[error(transparent)]
    Operation(E),

    #[error(transparent)]
    TypeMismatch(TypeMismatch),

    #[error(transparent)]
    Configuration(ConfigurationError),

    #[error("Caching machinery failed: {reason}")]
    Internal { reason: String },
}

impl<E> Failure<E> {
    pub fn origin(&self) -> Origin {
        match self {
            Failure::Operation(_) => Origin::Operation,
            _ => Origin::Internal,
        }
    }

    pub fn internal(reason: impl Into<String>) -> Self {
        Failure::Internal {
            reason: reason.into(),
        }
    }

    /// Key strategies fail either loudly (misconfiguration) or quietly.
    pub fn from_strategy(err: StrategyError) -> Self {
        match err {
            StrategyError::Configuration(e) => Failure::Configuration(e),
            other => Failure::Internal {
                reason: other.to_string(),
            },
        }
    }

    /// Surface the failure to the caller, or hand back the reason for an
    /// uncached retry when only the caching machinery broke.
    pub(crate) fn into_surfaced(self) -> Result<InvokeError<E>, String> {
        match self {
            Failure::Operation(e) => Ok(InvokeError::Operation(e)),
            Failure::TypeMismatch(e) => Ok(InvokeError::TypeMismatch(e)),
            Failure::Configuration(e) => Ok(InvokeError::Configuration(e)),
            Failure::Internal { reason } => Err(reason),
        }
    }
}

/// Error returned by [`CachingDecorator::invoke`](crate::CachingDecorator::invoke).
#[derive(Debug, Error)]
pub enum InvokeError<E> {
    /// The wrapped operation failed. Carried unaltered, raised once.
    #[error(transparent)]
    Operation(E),

    #[error(transparent)]
    TypeMismatch(#[from] TypeMismatch),

    /// The caching of this operation is misconfigured.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

impl<E> InvokeError<E> {
    pub fn origin(&self) -> Origin {
        match self {
            InvokeError::Operation(_) => Origin::Operation,
            _ => Origin::Internal,
        }
    }

    /// The operation's own error, if that is what failed.
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            InvokeError::Operation(e) => Some(e),
            _ => None,
        }
    }
}
