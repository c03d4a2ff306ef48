use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::client::VaultClient;
use crate::codec;
use crate::error::{Result, VaultError};
use crate::http::{HttpMethod, Params, Request};
use crate::transport::Transport;
use crate::types::Schema;

use super::{into_json, to_json};

/// Schema access for one vault. Schemas are never cached.
pub struct Schemas<'a, T> {
    client: &'a VaultClient<T>,
    vault_id: String,
    last_id: Option<String>,
}

impl<'a, T: Transport> Schemas<'a, T> {
    pub(crate) fn new(client: &'a VaultClient<T>, vault_id: String) -> Self {
        Self {
            client,
            vault_id,
            last_id: None,
        }
    }

    pub fn last_insert_id(&self) -> Option<&str> {
        self.last_id.as_deref()
    }

    fn collection_path(&self) -> String {
        format!("vaults/{}/schemas", self.vault_id)
    }

    fn item_path(&self, id: &str) -> String {
        format!("vaults/{}/schemas/{id}", self.vault_id)
    }

    /// Store a new schema and return it as the server recorded it. A
    /// response without a `schema` member is a `Generic` error.
    pub fn create<D: Serialize + ?Sized>(&mut self, schema: &D, mut params: Params) -> Result<Schema> {
        self.last_id = None;
        params.set("schema", codec::encode(&to_json(schema)?)?);

        let response = self.client.execute(
            Request::new(HttpMethod::Post, self.collection_path()).with_params(params),
        )?;
        let stored = schema_member(into_json(response))?;
        self.last_id = Some(stored.id.clone());
        Ok(stored)
    }

    pub fn get(&self, id: &str, params: Params) -> Result<Schema> {
        let response = self
            .client
            .execute(Request::new(HttpMethod::Get, self.item_path(id)).with_params(params))?;
        schema_member(into_json(response))
    }

    pub fn update<D: Serialize + ?Sized>(&self, id: &str, schema: &D, mut params: Params) -> Result<Value> {
        params.set("schema", codec::encode(&to_json(schema)?)?);
        let response = self
            .client
            .execute(Request::new(HttpMethod::Put, self.item_path(id)).with_params(params))?;
        Ok(into_json(response))
    }

    pub fn delete(&self, id: &str, params: Params) -> Result<Value> {
        let response = self
            .client
            .execute(Request::new(HttpMethod::Delete, self.item_path(id)).with_params(params))?;
        Ok(into_json(response))
    }

    /// Every schema of the vault as id → name.
    pub fn find_all(&self, params: Params) -> Result<BTreeMap<String, String>> {
        let response = self.client.execute(
            Request::new(HttpMethod::Get, self.collection_path()).with_params(params),
        )?;
        let body = into_json(response);
        let Some(Value::Array(schemas)) = body.get("schemas") else {
            return Err(VaultError::generic("Unable to obtain schema"));
        };
        Ok(schemas
            .iter()
            .filter_map(|schema| {
                let id = schema.get("id")?.as_str()?;
                let name = schema.get("name").and_then(Value::as_str).unwrap_or_default();
                Some((id.to_string(), name.to_string()))
            })
            .collect())
    }
}

fn schema_member(mut body: Value) -> Result<Schema> {
    match body.get_mut("schema") {
        Some(schema) => serde_json::from_value(schema.take())
            .map_err(|e| VaultError::generic(format!("Unable to obtain schema: {e}"))),
        None => Err(VaultError::generic("Unable to obtain schema")),
    }
}
