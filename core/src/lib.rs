//! Blocking client for the vault document, schema and blob storage API.
//!
//! # Overview
//! `VaultClient` turns resource operations (create, get, update, delete,
//! search, upload, download) into single HTTP round trips. Every call is
//! synchronous; there are no retries, no background work and no
//! cancellation.
//!
//! # Design
//! - `Transport` is the seam to the network. `UreqTransport` is the default
//!   and supports binary transfers; `ReqwestTransport` (feature `reqwest`)
//!   handles form calls only.
//! - Response classification lives in `http::classify` and is shared by all
//!   backends, so error semantics do not depend on the backend.
//! - Document, schema and search payloads travel as `base64(json)`
//!   envelopes (`codec`).
//! - Blob bytes stream through a `TransferHandle` that is closed when the
//!   call ends, whatever the outcome.
//! - Documents can be cached through the `Cache` trait; schemas and blobs
//!   never are.
//!
//! ```no_run
//! use std::sync::Arc;
//! use serde_json::json;
//! use vault_core::{ClientConfig, MemoryCache, Params, VaultClient};
//!
//! # fn main() -> vault_core::Result<()> {
//! let client = VaultClient::new(ClientConfig::new("api-key", "account-id"))
//!     .with_cache(Arc::new(MemoryCache::new()));
//!
//! let mut documents = client.documents("vault-id");
//! documents.create(&json!({"name": "Don Joe"}), Params::new())?;
//! let id = documents.last_insert_id().unwrap_or_default().to_string();
//! let value = documents.get(&id, Params::new())?;
//! # let _ = value;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod http;
pub mod resources;
pub mod transfer;
pub mod transport;
pub mod types;

pub use cache::{Cache, MemoryCache};
pub use client::VaultClient;
pub use config::{ClientConfig, API_VERSION, DEFAULT_ENDPOINT};
pub use error::{ErrorCode, ErrorKind, Result, VaultError};
pub use http::{Body, HttpMethod, Params, Request, Response, Transfer};
pub use resources::{Blobs, Documents, Schemas};
pub use transfer::{TransferHandle, TransferMode, TransferTarget};
#[cfg(feature = "reqwest")]
pub use transport::ReqwestTransport;
pub use transport::{Transport, UreqTransport};
pub use types::{Schema, SchemaField, Vault};
