//! Snapshot payload decoding.
//!
//! A payload is accepted only if it is a JSON array whose every element
//! decodes as a [`DeviceDescriptor`]. One bad element rejects the whole
//! payload; nothing is ever reconciled from a partial decode.

use serde::Deserialize;
use serde_json::Value;

use crate::error::ErrorCode;
use crate::model::device::DeviceDescriptor;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("expected a JSON array of device descriptors, found {found}")]
    NotAnArray { found: &'static str },

    #[error("descriptor {index}: {source}")]
    Descriptor {
        index: usize,
        #[source]
        source: serde_json::Error,
    },
}

impl DecodeError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        ErrorCode::MalformedPayload
    }
}

const fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Decode a raw snapshot payload into descriptors, preserving input order.
///
/// # Errors
///
/// Returns [`DecodeError`] if the payload is not an array or any element is
/// not a well-formed descriptor object.
pub fn decode_payload(raw: &Value) -> Result<Vec<DeviceDescriptor>, DecodeError> {
    let Value::Array(items) = raw else {
        return Err(DecodeError::NotAnArray {
            found: json_type_name(raw),
        });
    };

    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            DeviceDescriptor::deserialize(item)
                .map_err(|source| DecodeError::Descriptor { index, source })
        })
        .collect()
}
