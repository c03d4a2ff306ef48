//! Error types for the vault client.
//!
//! # Design
//! Every failure is surfaced to the immediate caller; nothing is retried.
//! `VaultError` carries the structured fields (message, code, server type)
//! and `ErrorKind` gives callers a flat tag to branch on without matching
//! the variant payloads.

use std::fmt;

use serde_json::Value;

/// Convenience alias used by every fallible operation in the crate.
pub type Result<T> = std::result::Result<T, VaultError>;

/// Error code as reported by the server or the network layer.
///
/// The server sends either a number or a dotted string such as
/// `"DOCUMENT.NOT_FOUND"`; an absent code becomes `Text("")`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCode {
    Int(i64),
    Text(String),
}

impl ErrorCode {
    /// Read a code out of a JSON value, defaulting to the empty string.
    pub fn from_json(value: Option<&Value>) -> Self {
        match value {
            Some(Value::Number(n)) => match n.as_i64() {
                Some(i) => ErrorCode::Int(i),
                None => ErrorCode::Text(n.to_string()),
            },
            Some(Value::String(s)) => ErrorCode::Text(s.clone()),
            Some(Value::Null) | None => ErrorCode::Text(String::new()),
            Some(other) => ErrorCode::Text(other.to_string()),
        }
    }
}

impl Default for ErrorCode {
    fn default() -> Self {
        ErrorCode::Text(String::new())
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::Int(i) => write!(f, "{i}"),
            ErrorCode::Text(s) => f.write_str(s),
        }
    }
}

/// Flat classification of a `VaultError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request never produced a usable response.
    Transport,
    /// The server answered with HTTP 500.
    RemoteInternal,
    /// The server answered with a structured `error` object.
    Api,
    /// A local stream could not be opened, sized, read or written.
    File,
    /// The transport backend does not implement the requested transfer mode.
    Unsupported,
    /// The response had an unexpected shape.
    Generic,
}

#[derive(thiserror::Error, Debug)]
pub enum VaultError {
    #[error("TransportError: {message}")]
    Transport { message: String, code: i64 },

    #[error("RemoteException: Remote server returned internal error")]
    RemoteInternal,

    #[error("{error_type}: {message}")]
    Api {
        message: String,
        code: ErrorCode,
        error_type: String,
    },

    #[error("FileException: {message}")]
    File { message: String },

    #[error("UnsupportedCapability: {capability} is not available with this transport")]
    Unsupported { capability: &'static str },

    #[error("Exception: {message}")]
    Generic { message: String },
}

impl VaultError {
    pub fn transport(message: impl Into<String>, code: i64) -> Self {
        VaultError::Transport {
            message: message.into(),
            code,
        }
    }

    pub fn file(message: impl Into<String>) -> Self {
        VaultError::File {
            message: message.into(),
        }
    }

    pub fn generic(message: impl Into<String>) -> Self {
        VaultError::Generic {
            message: message.into(),
        }
    }

    /// Build an `Api` error from the server's `error` object, defaulting
    /// each missing field to the empty string.
    pub fn from_error_object(error: &Value) -> Self {
        let text = |key: &str| match error.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };
        VaultError::Api {
            message: text("message"),
            code: ErrorCode::from_json(error.get("code")),
            error_type: text("type"),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            VaultError::Transport { .. } => ErrorKind::Transport,
            VaultError::RemoteInternal => ErrorKind::RemoteInternal,
            VaultError::Api { .. } => ErrorKind::Api,
            VaultError::File { .. } => ErrorKind::File,
            VaultError::Unsupported { .. } => ErrorKind::Unsupported,
            VaultError::Generic { .. } => ErrorKind::Generic,
        }
    }

    /// Human-readable message without the type prefix.
    pub fn message(&self) -> String {
        match self {
            VaultError::Transport { message, .. }
            | VaultError::Api { message, .. }
            | VaultError::File { message }
            | VaultError::Generic { message } => message.clone(),
            VaultError::RemoteInternal => "Remote server returned internal error".to_string(),
            VaultError::Unsupported { capability } => {
                format!("{capability} is not available with this transport")
            }
        }
    }

    /// Numeric or textual code; zero for locally detected failures.
    pub fn code(&self) -> ErrorCode {
        match self {
            VaultError::Transport { code, .. } => ErrorCode::Int(*code),
            VaultError::Api { code, .. } => code.clone(),
            _ => ErrorCode::Int(0),
        }
    }
}

impl From<std::io::Error> for VaultError {
    fn from(error: std::io::Error) -> Self {
        VaultError::file(error.to_string())
    }
}
