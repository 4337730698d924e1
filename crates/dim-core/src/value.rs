//! Explicit narrowing of dynamically typed call results
//!
//! Remote results are [`serde_json::Value`]s. These helpers check the shape
//! and fail with [`Error::UnexpectedShape`] instead of panicking.

use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Narrow a result to a JSON object
pub fn expect_object<'a>(value: &'a Value, what: &str) -> Result<&'a Map<String, Value>> {
    value.as_object().ok_or_else(|| shape_error(what, "object", value))
}

/// Narrow a result to a JSON array
pub fn expect_array<'a>(value: &'a Value, what: &str) -> Result<&'a Vec<Value>> {
    value.as_array().ok_or_else(|| shape_error(what, "array", value))
}

/// Narrow a result to an integer
pub fn expect_i64(value: &Value, what: &str) -> Result<i64> {
    value.as_i64().ok_or_else(|| shape_error(what, "integer", value))
}

fn shape_error(what: &str, expected: &str, got: &Value) -> Error {
    Error::unexpected_shape(format!("{what}: expected {expected}, got {}", kind_of(got)))
}

/// Read an optional string attribute from an object
///
/// A missing key or JSON null is `Ok(None)`; any other non-string value is an error.
pub fn opt_str<'a>(object: &'a Map<String, Value>, key: &str) -> Result<Option<&'a str>> {
    match object.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(Error::unexpected_shape(format!(
            "attribute '{key}': expected string, got {}",
            kind_of(other)
        ))),
    }
}

/// Short name of a value's JSON kind, for error messages
pub fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
