//! Network backends for the vault client.
//!
//! # Design
//! `Transport` is the only seam between the client and the network. A
//! backend receives a fully described [`Request`], performs one blocking
//! round trip and returns the outcome of [`classify`](crate::http::classify).
//! Backends must close any transfer handle they were given before returning,
//! on success and failure alike (dropping it is enough).
//!
//! Binary transfers are optional per backend: one that does not support them
//! fails with `VaultError::Unsupported` before touching the network.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::{debug, info};
use url::Url;

use crate::config::{ClientConfig, API_VERSION};
use crate::error::{Result, VaultError};
use crate::http::{HttpMethod, Params, Request, Response};

#[cfg(feature = "reqwest")]
mod reqwest_transport;
mod ureq_transport;

#[cfg(feature = "reqwest")]
pub use reqwest_transport::ReqwestTransport;
pub use ureq_transport::UreqTransport;

pub trait Transport: Send + Sync {
    fn invoke(&self, request: Request) -> Result<Response>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn invoke(&self, request: Request) -> Result<Response> {
        (**self).invoke(request)
    }
}

/// `{endpoint}/v1/{path}`, with `query` appended only when non-empty.
pub fn build_url(endpoint: &str, path: &str, query: &Params) -> Result<Url> {
    let path = path.strip_prefix('/').unwrap_or(path);
    let raw = format!("{}/{API_VERSION}/{path}", endpoint.trim_end_matches('/'));
    let mut url = Url::parse(&raw)
        .map_err(|e| VaultError::transport(format!("invalid url {raw}: {e}"), 0))?;
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query.pairs());
    }
    Ok(url)
}

/// HTTP Basic credentials: the API key as user name, empty password.
pub fn basic_auth(api_key: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{api_key}:")))
}

pub(crate) fn log_request(config: &ClientConfig, method: HttpMethod, url: &Url, transfer: &str) {
    if config.debug {
        info!(method = method.as_str(), %url, transfer, "vault request");
    } else {
        debug!(method = method.as_str(), %url, transfer, "vault request");
    }
}

pub(crate) fn log_response(
    config: &ClientConfig,
    status: u16,
    content_type: &str,
    headers: &[(String, String)],
) {
    if config.debug {
        info!(status, content_type, ?headers, "vault response");
    } else {
        debug!(status, content_type, "vault response");
    }
}
