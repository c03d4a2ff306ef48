use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::client::VaultClient;
use crate::codec;
use crate::error::{Result, VaultError};
use crate::http::{HttpMethod, Params, Request};
use crate::transport::Transport;

use super::{into_json, to_json};

/// Document access for one vault, with optional caching.
///
/// With a cache configured on the client:
/// - `get` answers from the cache when the id is present and fills it after
///   a network read;
/// - `get_many` answers from the cache only when every id is present,
///   otherwise it fetches the whole batch from the network;
/// - `create` and `update` store the value passed in once the server has
///   accepted it, `delete` removes the entry once the server confirms.
///
/// The cache is never touched when the network call fails.
pub struct Documents<'a, T> {
    client: &'a VaultClient<T>,
    vault_id: String,
    last_id: Option<String>,
}

impl<'a, T: Transport> Documents<'a, T> {
    pub(crate) fn new(client: &'a VaultClient<T>, vault_id: String) -> Self {
        Self {
            client,
            vault_id,
            last_id: None,
        }
    }

    pub fn vault_id(&self) -> &str {
        &self.vault_id
    }

    /// Id returned by the most recent successful `create`.
    pub fn last_insert_id(&self) -> Option<&str> {
        self.last_id.as_deref()
    }

    fn collection_path(&self) -> String {
        format!("vaults/{}/documents", self.vault_id)
    }

    fn item_path(&self, id: &str) -> String {
        format!("vaults/{}/documents/{id}", self.vault_id)
    }

    pub fn create<D: Serialize + ?Sized>(&mut self, data: &D, mut params: Params) -> Result<Value> {
        self.last_id = None;
        let value = to_json(data)?;
        params.set("document", codec::encode(&value)?);

        let response = self.client.execute(
            Request::new(HttpMethod::Post, self.collection_path()).with_params(params),
        )?;
        let body = into_json(response);

        if let Some(id) = body.get("document_id").and_then(Value::as_str) {
            self.last_id = Some(id.to_string());
            if let Some(cache) = self.client.cache() {
                cache.set(&self.vault_id, id, Some(value));
            }
        }
        Ok(body)
    }

    /// Fetch one document. `None` means the stored envelope could not be
    /// decoded.
    pub fn get(&self, id: &str, params: Params) -> Result<Option<Value>> {
        if let Some(cache) = self.client.cache() {
            if let Some(value) = cache.get(&self.vault_id, id) {
                debug!(vault_id = %self.vault_id, id, "document cache hit");
                return Ok(Some(value));
            }
            debug!(vault_id = %self.vault_id, id, "document cache miss");
        }

        let response = self
            .client
            .execute(Request::new(HttpMethod::Get, self.item_path(id)).with_params(params))?;
        let value = match into_json(response) {
            Value::String(envelope) => codec::decode(&envelope),
            Value::Object(body) => match body.get("documents") {
                Some(Value::Array(documents)) => documents
                    .iter()
                    .find(|doc| doc.get("id").and_then(Value::as_str) == Some(id))
                    .and_then(|doc| doc.get("document"))
                    .and_then(Value::as_str)
                    .and_then(codec::decode),
                _ => return Err(VaultError::generic("Unable to obtain document")),
            },
            _ => return Err(VaultError::generic("Unable to obtain document")),
        };

        if let (Some(cache), Some(value)) = (self.client.cache(), &value) {
            cache.set(&self.vault_id, id, Some(value.clone()));
        }
        Ok(value)
    }

    /// Fetch several documents in one call, keyed by id. Entries whose
    /// envelope cannot be decoded are `null`.
    ///
    /// The cache only answers when it holds every requested id; a single
    /// miss discards all hits and the whole batch comes from the network,
    /// so a result is never a mix of cached and fetched values.
    pub fn get_many(&self, ids: &[&str], params: Params) -> Result<Map<String, Value>> {
        if ids.is_empty() {
            return Ok(Map::new());
        }

        if let Some(cache) = self.client.cache() {
            let mut hits = Map::new();
            let complete = ids.iter().all(|id| match cache.get(&self.vault_id, id) {
                Some(value) => {
                    hits.insert((*id).to_string(), value);
                    true
                }
                None => false,
            });
            if complete {
                debug!(vault_id = %self.vault_id, count = ids.len(), "document batch served from cache");
                return Ok(hits);
            }
            debug!(vault_id = %self.vault_id, count = ids.len(), "document batch cache miss");
        }

        let response = self.client.execute(
            Request::new(HttpMethod::Get, self.item_path(&ids.join(","))).with_params(params),
        )?;

        let mut documents = Map::new();
        match into_json(response) {
            Value::Object(body) => match body.get("documents") {
                Some(Value::Array(list)) => {
                    for doc in list {
                        let Some(id) = doc.get("id").and_then(Value::as_str) else {
                            continue;
                        };
                        let value = doc
                            .get("document")
                            .and_then(Value::as_str)
                            .and_then(codec::decode)
                            .unwrap_or(Value::Null);
                        documents.insert(id.to_string(), value);
                    }
                }
                _ => return Err(VaultError::generic("Unable to obtain document")),
            },
            Value::String(envelope) if ids.len() == 1 => {
                let value = codec::decode(&envelope).unwrap_or(Value::Null);
                documents.insert(ids[0].to_string(), value);
            }
            _ => return Err(VaultError::generic("Unable to obtain document")),
        }

        if let Some(cache) = self.client.cache() {
            for (id, value) in documents.iter().filter(|(_, v)| !v.is_null()) {
                cache.set(&self.vault_id, id, Some(value.clone()));
            }
        }
        Ok(documents)
    }

    pub fn update<D: Serialize + ?Sized>(&self, id: &str, data: &D, mut params: Params) -> Result<Value> {
        let value = to_json(data)?;
        params.set("document", codec::encode(&value)?);

        let response = self
            .client
            .execute(Request::new(HttpMethod::Put, self.item_path(id)).with_params(params))?;

        if let Some(cache) = self.client.cache() {
            cache.set(&self.vault_id, id, Some(value));
        }
        Ok(into_json(response))
    }

    pub fn delete(&self, id: &str, params: Params) -> Result<Value> {
        let response = self
            .client
            .execute(Request::new(HttpMethod::Delete, self.item_path(id)).with_params(params))?;

        if let Some(cache) = self.client.cache() {
            cache.delete(&self.vault_id, id);
        }
        Ok(into_json(response))
    }

    /// Query indexed documents. Returns the `data` member of the response
    /// when present, the whole response otherwise.
    pub fn search<S: Serialize + ?Sized>(&self, options: &S, params: Params) -> Result<Value> {
        let query = Params::new().with("search_option", codec::encode(options)?);
        let response = self.client.execute(
            Request::new(HttpMethod::Get, format!("vaults/{}/", self.vault_id))
                .with_params(params)
                .with_query(query),
        )?;

        let mut body = into_json(response);
        if let Some(data) = body.get_mut("data") {
            return Ok(data.take());
        }
        Ok(body)
    }
}
