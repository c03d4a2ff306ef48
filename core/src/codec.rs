//! Envelope codec for document, schema and search payloads.
//!
//! A value travels as `base64(json(value))` so it fits inside a single
//! form field or query parameter.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use serde_json::Value;

use crate::error::{Result, VaultError};

/// Serialize `value` to JSON and wrap it in standard base64.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let json = serde_json::to_vec(value)
        .map_err(|e| VaultError::generic(format!("unable to encode payload: {e}")))?;
    Ok(STANDARD.encode(json))
}

/// Inverse of [`encode`]. Malformed base64 or JSON yields `None`.
pub fn decode(data: &str) -> Option<Value> {
    let bytes = STANDARD.decode(data.trim()).ok()?;
    serde_json::from_slice(&bytes).ok()
}
