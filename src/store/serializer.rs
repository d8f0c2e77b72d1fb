//! Document body codec
//!
//! Record bodies travel as serialized strings and are decoded into JSON values
//! only when they are turned into store operations. The codec is injected into
//! the coordinator rather than shared globally.

use serde_json::Value;
use thiserror::Error;

/// Failure to encode or decode a document body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("serialization failed: {0}")]
pub struct SerializeError(pub String);

/// Converts between serialized record bodies and store documents.
pub trait DocumentSerializer: Send + Sync {
    fn encode(&self, body: &Value) -> Result<String, SerializeError>;

    fn decode(&self, body: &str) -> Result<Value, SerializeError>;
}

/// serde_json codec. Compact output, objects only on decode.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl DocumentSerializer for JsonSerializer {
    fn encode(&self, body: &Value) -> Result<String, SerializeError> {
        serde_json::to_string(body).map_err(|e| SerializeError(e.to_string()))
    }

    fn decode(&self, body: &str) -> Result<Value, SerializeError> {
        let value: Value = serde_json::from_str(body).map_err(|e| SerializeError(e.to_string()))?;
        if !value.is_object() {
            return Err(SerializeError(format!(
                "document body must be a JSON object, got {}",
                json_kind(&value)
            )));
        }
        Ok(value)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
