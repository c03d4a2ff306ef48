//! Per-vault accessors for documents, schemas and blobs.

mod blobs;
mod documents;
mod schemas;

pub use blobs::Blobs;
pub use documents::Documents;
pub use schemas::Schemas;

use serde::Serialize;
use serde_json::Value;

use crate::error::{Result, VaultError};
use crate::http::{Body, Response};

/// Response body as JSON. Non-JSON text becomes a JSON string and a
/// streamed download becomes `null`.
pub(crate) fn into_json(response: Response) -> Value {
    match response.body {
        Body::Json(value) => value,
        Body::Raw(bytes) => Value::String(String::from_utf8_lossy(&bytes).into_owned()),
        Body::Streamed { .. } => Value::Null,
    }
}

pub(crate) fn to_json<D: Serialize + ?Sized>(data: &D) -> Result<Value> {
    serde_json::to_value(data).map_err(|e| VaultError::generic(format!("unable to encode payload: {e}")))
}
