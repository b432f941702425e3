//! Value codec
//!
//! Flat engines only hold strings, so values go through `serde_json` text.
//! Schema versions are stored the same way, as a bare JSON integer.

use crate::error::{Error, Result};
use crate::Value;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encode a value as JSON text.
pub fn encode(value: &Value) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

/// Decode JSON text into a value.
pub fn decode(text: &str) -> Result<Value> {
    Ok(serde_json::from_str(text)?)
}

/// Convert any serializable type into a [`Value`].
pub fn to_value<T: Serialize + ?Sized>(value: &T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

/// Convert a [`Value`] into a deserializable type.
pub fn from_value<T: DeserializeOwned>(value: Value) -> Result<T> {
    Ok(serde_json::from_value(value)?)
}

/// Encode a schema version.
pub fn encode_version(version: u64) -> String {
    version.to_string()
}

/// Decode a schema version written by [`encode_version`].
pub fn decode_version(text: &str) -> Result<u64> {
    match decode(text)? {
        Value::Number(n) => n.as_u64().ok_or_else(|| {
            Error::Serialization(format!("schema version is not a non-negative integer: {}", n))
        }),
        other => Err(Error::Serialization(format!(
            "schema version is not a number: {}",
            other
        ))),
    }
}
