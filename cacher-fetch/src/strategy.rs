//! Key strategies: turning an operation's arguments into cache keys.
//!
//! A [`KeyDeriver`] reads the cache key (or keys) out of a request. A
//! [`KeyStripper`] narrows a batch request down to the keys the cache
//! could not answer. Requests are immutable; stripping builds a new one,
//! so the caller always still holds the original arguments.

use cacher_core::{ConfigurationError, StrategyError};
use serde_json::Value;

/// One argument of an operation call.
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    value: Value,
    key_carrier: bool,
}

impl Argument {
    /// An argument that does not take part in the cache key.
    pub fn plain(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            key_carrier: false,
        }
    }

    /// The argument carrying the cache key (or the list of keys in batch mode).
    pub fn key(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            key_carrier: true,
        }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn is_key_carrier(&self) -> bool {
        self.key_carrier
    }
}

/// The ordered arguments of one operation call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationRequest {
    arguments: Vec<Argument>,
}

impl OperationRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_arguments(arguments: Vec<Argument>) -> Self {
        Self { arguments }
    }

    /// Append a plain argument.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.arguments.push(Argument::plain(value));
        self
    }

    /// Append the key carrier argument.
    pub fn key_arg(mut self, value: impl Into<Value>) -> Self {
        self.arguments.push(Argument::key(value));
        self
    }

    pub fn arguments(&self) -> &[Argument] {
        &self.arguments
    }

    pub fn len(&self) -> usize {
        self.arguments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arguments.is_empty()
    }

    /// Value of the argument at `position`.
    pub fn get(&self, position: usize) -> Option<&Value> {
        self.arguments.get(position).map(Argument::value)
    }

    /// Positions of every argument marked as key carrier.
    pub fn key_positions(&self) -> Vec<usize> {
        self.arguments
            .iter()
            .enumerate()
            .filter(|(_, a)| a.key_carrier)
            .map(|(i, _)| i)
            .collect()
    }

    /// A copy of this request with the argument at `position` replaced.
    ///
    /// The replacement keeps the key carrier flag. Returns `None` when
    /// `position` is out of range.
    pub fn with_value(&self, position: usize, value: Value) -> Option<Self> {
        let mut arguments = self.arguments.clone();
        arguments.get_mut(position)?.value = value;
        Some(Self { arguments })
    }
}

/// Derives cache keys from a request.
pub trait KeyDeriver: Send + Sync {
    fn derive_key(&self, request: &OperationRequest) -> Result<String, StrategyError>;

    fn derive_keys(&self, request: &OperationRequest) -> Result<Vec<String>, StrategyError>;
}

/// Narrows a batch request to the keys that still need fetching.
pub trait KeyStripper: Send + Sync {
    fn strip_keys(
        &self,
        request: &OperationRequest,
        missing: &[String],
    ) -> Result<OperationRequest, StrategyError>;
}

/// Uses the single argument marked as key carrier.
///
/// Strings are used as they are; numbers and booleans by their textual
/// form. Batch keys must be an array of such values.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultKeyDeriver;

impl KeyDeriver for DefaultKeyDeriver {
    fn derive_key(&self, request: &OperationRequest) -> Result<String, StrategyError> {
        let position = key_position(request)?;
        key_to_string(position, &request.arguments[position].value)
    }

    fn derive_keys(&self, request: &OperationRequest) -> Result<Vec<String>, StrategyError> {
        let position = key_position(request)?;
        match &request.arguments[position].value {
            Value::Array(items) => items
                .iter()
                .map(|item| key_to_string(position, item))
                .collect(),
            other => Err(StrategyError::KeyConversion {
                position,
                reason: format!("expected a list of keys, got {}", json_kind(other)),
            }),
        }
    }
}

/// Replaces the key carrier with the list of missing keys.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultKeyStripper;

impl KeyStripper for DefaultKeyStripper {
    fn strip_keys(
        &self,
        request: &OperationRequest,
        missing: &[String],
    ) -> Result<OperationRequest, StrategyError> {
        let position = key_position(request)?;
        let keys = Value::Array(missing.iter().cloned().map(Value::String).collect());
        request
            .with_value(position, keys)
            .ok_or_else(|| StrategyError::Failed {
                reason: format!("no argument at position {}", position),
            })
    }
}

/// For batch operations whose arguments cannot be narrowed.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedKeyStripper;

impl KeyStripper for UnsupportedKeyStripper {
    fn strip_keys(
        &self,
        _request: &OperationRequest,
        _missing: &[String],
    ) -> Result<OperationRequest, StrategyError> {
        Err(StrategyError::Unsupported {
            strategy: "UnsupportedKeyStripper".to_string(),
        })
    }
}

/// Position of the one key carrier argument.
fn key_position(request: &OperationRequest) -> Result<usize, StrategyError> {
    let positions = request.key_positions();
    match positions.len() {
        0 => Err(ConfigurationError::NoKeyDesignated.into()),
        1 => Ok(positions[0]),
        _ => Err(ConfigurationError::AmbiguousKeyDesignation { positions }.into()),
    }
}

fn key_to_string(position: usize, value: &Value) -> Result<String, StrategyError> {
    match value {
        Value::String(s) if !s.is_empty() => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(StrategyError::KeyConversion {
            position,
            reason: format!("{} cannot be used as a cache key", json_kind(other)),
        }),
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(s) if s.is_empty() => "an empty string",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
