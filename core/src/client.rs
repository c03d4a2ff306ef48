//! Entry point of the library.
//!
//! # Design
//! `VaultClient` owns the configuration, one `Transport` and an optional
//! shared `Cache`. It carries no mutable state between calls, so a client
//! can be shared by reference across threads as long as its transport and
//! cache allow it. Resource accessors borrow the client and add the path
//! and payload shaping for one vault.

use std::sync::Arc;

use serde_json::Value;

use crate::cache::Cache;
use crate::config::ClientConfig;
use crate::error::{Result, VaultError};
use crate::http::{HttpMethod, Params, Request, Response, Transfer};
use crate::resources::{into_json, Blobs, Documents, Schemas};
use crate::transport::{Transport, UreqTransport};
use crate::types::Vault;

pub struct VaultClient<T = UreqTransport> {
    config: ClientConfig,
    transport: T,
    cache: Option<Arc<dyn Cache>>,
}

impl VaultClient<UreqTransport> {
    /// Client over the default `ureq` backend.
    pub fn new(config: ClientConfig) -> Self {
        let transport = UreqTransport::new(config.clone());
        Self::with_transport(config, transport)
    }
}

impl<T: Transport> VaultClient<T> {
    pub fn with_transport(config: ClientConfig, transport: T) -> Self {
        Self {
            config,
            transport,
            cache: None,
        }
    }

    /// Enable read-through/write-through caching of documents.
    pub fn with_cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn cache(&self) -> Option<&dyn Cache> {
        self.cache.as_deref()
    }

    /// Raw API call: `path` is relative to the versioned endpoint.
    pub fn api(
        &self,
        path: &str,
        method: HttpMethod,
        params: Params,
        transfer: Transfer,
    ) -> Result<Response> {
        self.execute(
            Request::new(method, path)
                .with_params(params)
                .with_transfer(transfer),
        )
    }

    pub(crate) fn execute(&self, request: Request) -> Result<Response> {
        self.transport.invoke(request)
    }

    /// All vaults of the configured account.
    pub fn find_all_vaults(&self) -> Result<Vec<Vault>> {
        let path = format!("accounts/{}/vaults", self.config.account_id);
        let body = into_json(self.execute(Request::new(HttpMethod::Get, path))?);
        match body.get("vaults") {
            Some(vaults @ Value::Array(_)) => serde_json::from_value(vaults.clone())
                .map_err(|e| VaultError::generic(format!("Unable to obtain list of vaults: {e}"))),
            _ => Err(VaultError::generic("Unable to obtain list of vaults")),
        }
    }

    pub fn documents(&self, vault_id: impl Into<String>) -> Documents<'_, T> {
        Documents::new(self, vault_id.into())
    }

    pub fn schemas(&self, vault_id: impl Into<String>) -> Schemas<'_, T> {
        Schemas::new(self, vault_id.into())
    }

    pub fn blobs(&self, vault_id: impl Into<String>) -> Blobs<'_, T> {
        Blobs::new(self, vault_id.into())
    }
}
