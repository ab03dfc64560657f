//! Text codecs for the JSON-RPC adapter and value conversion helpers.
//!
//! The adapter never touches JSON text itself. It goes through a
//! [`Deserializer`] on the way in and a [`Serializer`] on the way out, both of
//! which default to `serde_json` and can be replaced independently.

use std::sync::Arc;

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{Error, Result};

/// Turns inbound text into a JSON value
pub type Deserializer = Arc<dyn Fn(&str) -> Result<Value> + Send + Sync>;

/// Turns an outbound JSON value into text
pub type Serializer = Arc<dyn Fn(&Value) -> Result<String> + Send + Sync>;

/// Standard `serde_json` text decoding
pub fn json_deserialize(text: &str) -> Result<Value> {
    Ok(serde_json::from_str(text)?)
}

/// Standard `serde_json` text encoding
pub fn json_serialize(value: &Value) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

/// `serde_json` decoding as a replaceable hook
pub fn default_deserializer() -> Deserializer {
    Arc::new(json_deserialize)
}

/// `serde_json` encoding as a replaceable hook
pub fn default_serializer() -> Serializer {
    Arc::new(json_serialize)
}

/// Helper to serialize a handler result
pub fn to_value<T: Serialize>(value: T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

/// Bind request params to a handler's parameter type.
///
/// An empty array that does not bind as is gets a second try as `null`, so
/// `()` and `Option<_>` parameters accept a call without params while
/// sequence types still see `[]`.
pub fn from_params<T: DeserializeOwned>(params: Value) -> Result<T> {
    let empty = matches!(&params, Value::Array(args) if args.is_empty());
    match serde_json::from_value(params) {
        Ok(bound) => Ok(bound),
        Err(err) => {
            if empty {
                if let Ok(bound) = serde_json::from_value(Value::Null) {
                    return Ok(bound);
                }
            }
            Err(Error::InvalidParams(err.to_string()))
        }
    }
}
