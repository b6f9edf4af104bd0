//! # Envelope Codec
//!
//! Wire format for request/reply messages: one UTF-8 JSON object holding the
//! payload's own fields plus a `"CorrelationId"` field (canonical hyphenated
//! UUID) at the top level.
//!
//! ```json
//! {"UserId":"u-17","CorrelationId":"6f1c0b8e-3e4a-4a43-9d0c-2b1f6f9e4f10"}
//! ```
//!
//! Payload types stay bare: they never declare the correlation field
//! themselves. Unknown fields are ignored on decode.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use shared_types::CorrelationId;
use thiserror::Error;

/// Top-level JSON field carrying the correlation id.
pub const CORRELATION_FIELD: &str = "CorrelationId";

/// A decoded message: correlation id plus typed payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope<T> {
    pub correlation_id: CorrelationId,
    pub payload: T,
}

impl<T> Envelope<T> {
    pub fn new(correlation_id: CorrelationId, payload: T) -> Self {
        Self {
            correlation_id,
            payload,
        }
    }

    /// Replace the payload, keeping the correlation id.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Envelope<U> {
        Envelope {
            correlation_id: self.correlation_id,
            payload: f(self.payload),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("Payload serialization failed: {0}")]
    Serialize(String),

    /// Only JSON objects can carry the correlation field alongside.
    #[error("Payload must serialize to a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("Payload already declares a {CORRELATION_FIELD} field")]
    ReservedField,

    #[error("Refusing to encode the nil correlation id")]
    NilCorrelationId,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Empty message body")]
    Empty,

    /// Not UTF-8 JSON, not an object, or the id is not a UUID.
    #[error("Malformed message: {0}")]
    Malformed(String),

    /// Field absent, null, or the nil UUID.
    #[error("Message has no usable {CORRELATION_FIELD}")]
    MissingCorrelationId,

    /// Envelope fine, payload does not match the expected type.
    #[error("Payload does not match expected type: {0}")]
    Payload(String),
}

/// Serialize `payload` and add the correlation field at the top level.
pub fn encode<T: Serialize + ?Sized>(
    correlation_id: CorrelationId,
    payload: &T,
) -> Result<Vec<u8>, EncodeError> {
    if correlation_id.is_nil() {
        return Err(EncodeError::NilCorrelationId);
    }

    let mut object = match serde_json::to_value(payload) {
        Ok(Value::Object(map)) => map,
        Ok(other) => return Err(EncodeError::NotAnObject(kind(&other))),
        Err(e) => return Err(EncodeError::Serialize(e.to_string())),
    };
    if object.contains_key(CORRELATION_FIELD) {
        return Err(EncodeError::ReservedField);
    }
    object.insert(
        CORRELATION_FIELD.to_string(),
        Value::String(correlation_id.to_string()),
    );

    serde_json::to_vec(&Value::Object(object)).map_err(|e| EncodeError::Serialize(e.to_string()))
}

/// Parse `bytes` into an envelope carrying a `T` payload.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<Envelope<T>, DecodeError> {
    let (correlation_id, rest) = split(bytes)?;
    let payload =
        serde_json::from_value(Value::Object(rest)).map_err(|e| DecodeError::Payload(e.to_string()))?;
    Ok(Envelope::new(correlation_id, payload))
}

/// Read only the correlation id, without committing to a payload type.
pub fn peek_correlation_id(bytes: &[u8]) -> Result<CorrelationId, DecodeError> {
    split(bytes).map(|(id, _)| id)
}

fn split(bytes: &[u8]) -> Result<(CorrelationId, Map<String, Value>), DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }

    let mut object = match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            return Err(DecodeError::Malformed(format!(
                "expected a JSON object, got {}",
                kind(&other)
            )))
        }
        Err(e) => return Err(DecodeError::Malformed(e.to_string())),
    };

    let correlation_id = match object.remove(CORRELATION_FIELD) {
        None | Some(Value::Null) => return Err(DecodeError::MissingCorrelationId),
        Some(Value::String(raw)) => CorrelationId::parse(&raw)
            .map_err(|e| DecodeError::Malformed(format!("bad {CORRELATION_FIELD}: {e}")))?,
        Some(other) => {
            return Err(DecodeError::Malformed(format!(
                "{CORRELATION_FIELD} must be a string, got {}",
                kind(&other)
            )))
        }
    };
    if correlation_id.is_nil() {
        return Err(DecodeError::MissingCorrelationId);
    }

    Ok((correlation_id, object))
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
