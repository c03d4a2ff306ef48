//! Request and response types plus response classification.
//!
//! # Design
//! A request is plain data: path, method, form parameters, optional query
//! parameters and a `Transfer` mode. Transport backends turn it into a
//! network call and hand the raw outcome back to [`classify`], so every
//! backend shares one set of error rules.

use serde_json::Value;

use crate::error::{Result, VaultError};
use crate::transfer::TransferHandle;

pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const OCTET_STREAM_CONTENT_TYPE: &str = "application/octet-stream";
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// Ordered string parameters. Setting an existing key replaces its value
/// in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    pairs: Vec<(String, String)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.pairs.iter_mut().find(|(k, _)| *k == key) {
            Some(pair) => pair.1 = value,
            None => self.pairs.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    /// Serialize as a single `application/x-www-form-urlencoded` string.
    pub fn to_form(&self) -> Result<String> {
        serde_urlencoded::to_string(&self.pairs)
            .map_err(|e| VaultError::generic(format!("unable to encode parameters: {e}")))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (k, v) in iter {
            params.set(k, v);
        }
        params
    }
}

/// Binary transfer attached to a request.
///
/// At most one direction can be active for a call; the handle is owned by
/// the request and closed when the call finishes.
#[derive(Debug, Default)]
pub enum Transfer {
    #[default]
    None,
    Upload(TransferHandle),
    Download(TransferHandle),
}

impl Transfer {
    pub fn label(&self) -> &'static str {
        match self {
            Transfer::None => "none",
            Transfer::Upload(_) => "upload",
            Transfer::Download(_) => "download",
        }
    }
}

/// A call against the vault API described as plain data.
#[derive(Debug)]
pub struct Request {
    pub path: String,
    pub method: HttpMethod,
    pub params: Params,
    /// Appended to the URL only when non-empty.
    pub query: Params,
    pub transfer: Transfer,
}

impl Request {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method,
            params: Params::new(),
            query: Params::new(),
            transfer: Transfer::None,
        }
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    pub fn with_query(mut self, query: Params) -> Self {
        self.query = query;
        self
    }

    pub fn with_transfer(mut self, transfer: Transfer) -> Self {
        self.transfer = transfer;
        self
    }
}

/// Response body after classification.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// A JSON response, already parsed.
    Json(Value),
    /// Any other content type, passed through unchanged.
    Raw(Vec<u8>),
    /// Bytes were written to a download sink instead of being buffered.
    Streamed { bytes: u64 },
}

impl Body {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Body::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_json(self) -> Option<Value> {
        match self {
            Body::Json(value) => Some(value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub content_type: String,
    pub body: Body,
}

/// What a backend observed on the wire, before any interpretation.
#[derive(Debug)]
pub enum RawBody {
    Bytes(Vec<u8>),
    Streamed { bytes: u64 },
}

/// Media type without parameters, lowercased: `"application/json"` for
/// `"Application/JSON; charset=utf-8"`.
pub fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

pub fn is_json(content_type: &str) -> bool {
    media_type(content_type) == JSON_CONTENT_TYPE
}

pub fn is_octet_stream(content_type: &str) -> bool {
    media_type(content_type) == OCTET_STREAM_CONTENT_TYPE
}

fn is_blank(bytes: &[u8]) -> bool {
    bytes.iter().all(u8::is_ascii_whitespace)
}

/// Turn a raw outcome into a success body or the matching error.
///
/// Order matters: JSON parse failures first, then server `error` objects,
/// then HTTP 500, and only then success.
pub fn classify(status: u16, content_type: &str, raw: RawBody) -> Result<Response> {
    let body = match raw {
        // An empty JSON-typed body carries nothing to parse.
        RawBody::Bytes(bytes) if is_json(content_type) && !is_blank(&bytes) => {
            let value: Value = serde_json::from_slice(&bytes)
                .map_err(|e| VaultError::transport(format!("invalid JSON response: {e}"), 0))?;
            if value == Value::Bool(false) {
                return Err(VaultError::transport("empty result from server", 0));
            }
            Body::Json(value)
        }
        RawBody::Bytes(bytes) => Body::Raw(bytes),
        RawBody::Streamed { bytes } => Body::Streamed { bytes },
    };

    if let Body::Json(Value::Object(map)) = &body {
        if let Some(error) = map.get("error") {
            return Err(VaultError::from_error_object(error));
        }
    }

    if status == 500 {
        return Err(VaultError::RemoteInternal);
    }

    Ok(Response {
        status,
        content_type: content_type.to_string(),
        body,
    })
}
