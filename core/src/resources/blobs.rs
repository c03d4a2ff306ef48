use serde_json::Value;

use crate::client::VaultClient;
use crate::error::Result;
use crate::http::{Body, HttpMethod, Params, Request, Transfer};
use crate::transfer::{TransferHandle, TransferMode, TransferTarget};
use crate::transport::Transport;

use super::into_json;

/// Binary object storage for one vault. Blobs are never cached.
pub struct Blobs<'a, T> {
    client: &'a VaultClient<T>,
    vault_id: String,
    last_id: Option<String>,
}

impl<'a, T: Transport> Blobs<'a, T> {
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
        format!("vaults/{}/blobs", self.vault_id)
    }

    fn item_path(&self, id: &str) -> String {
        format!("vaults/{}/blobs/{id}", self.vault_id)
    }

    /// Upload the bytes of `source`. With `blob_id` the existing blob is
    /// replaced, otherwise a new blob is created and its id recorded.
    ///
    /// A seekable `source` is sent from its current position, so a handle
    /// that has already been partly read uploads only the remaining bytes.
    pub fn upload(&mut self, source: TransferHandle, blob_id: Option<&str>, params: Params) -> Result<Value> {
        let request = match blob_id {
            Some(id) => Request::new(HttpMethod::Put, self.item_path(id)),
            None => {
                self.last_id = None;
                Request::new(HttpMethod::Post, self.collection_path())
            }
        };
        let response = self
            .client
            .execute(request.with_params(params).with_transfer(Transfer::Upload(source)))?;
        let body = into_json(response);

        if blob_id.is_none() {
            if let Some(id) = body.get("blob_id").and_then(Value::as_str) {
                self.last_id = Some(id.to_string());
            }
        }
        Ok(body)
    }

    /// Open `source` for reading and upload it.
    pub fn upload_from(
        &mut self,
        source: impl Into<TransferTarget>,
        blob_id: Option<&str>,
        params: Params,
    ) -> Result<Value> {
        let handle = TransferHandle::open(source, TransferMode::Read)?;
        self.upload(handle, blob_id, params)
    }

    /// Stream a blob into `destination`, returning the number of bytes
    /// written.
    pub fn download(&self, blob_id: &str, destination: TransferHandle, params: Params) -> Result<u64> {
        let response = self.client.execute(
            Request::new(HttpMethod::Get, self.item_path(blob_id))
                .with_params(params)
                .with_transfer(Transfer::Download(destination)),
        )?;
        Ok(match response.body {
            Body::Streamed { bytes } => bytes,
            Body::Raw(bytes) => bytes.len() as u64,
            Body::Json(_) => 0,
        })
    }

    /// Create or truncate `destination` and download into it.
    pub fn download_to(&self, blob_id: &str, destination: impl Into<TransferTarget>, params: Params) -> Result<u64> {
        let handle = TransferHandle::open(destination, TransferMode::Write)?;
        self.download(blob_id, handle, params)
    }

    pub fn delete(&self, blob_id: &str, params: Params) -> Result<Value> {
        let response = self.client.execute(
            Request::new(HttpMethod::Delete, self.item_path(blob_id)).with_params(params),
        )?;
        Ok(into_json(response))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use serde_json::json;

    use crate::client::testing::ScriptedTransport;
    use crate::client::VaultClient;
    use crate::config::ClientConfig;
    use crate::error::ErrorKind;
    use crate::http::{HttpMethod, Params};
    use crate::transfer::TransferHandle;

    fn client(transport: ScriptedTransport) -> VaultClient<ScriptedTransport> {
        VaultClient::with_transport(ClientConfig::new("key", "acct"), transport)
    }

    #[test]
    fn new_upload_posts_and_records_id() {
        let c = client(ScriptedTransport::default().reply_json(200, json!({"blob_id": "b1", "result": "success"})));
        let mut blobs = c.blobs("v1");

        let source = TransferHandle::from_seekable("mem", Cursor::new(b"payload".to_vec()));
        blobs.upload(source, None, Params::new()).unwrap();

        assert_eq!(blobs.last_insert_id(), Some("b1"));
        let call = &c.transport().calls()[0];
        assert_eq!(call.method, HttpMethod::Post);
        assert_eq!(call.path, "vaults/v1/blobs");
        assert_eq!(call.transfer, "upload");
    }

    #[test]
    fn replacing_upload_puts_to_item_path() {
        let c = client(ScriptedTransport::default().reply_json(200, json!({"blob_id": "b1", "result": "success"})));
        let mut blobs = c.blobs("v1");

        let source = TransferHandle::from_seekable("mem", Cursor::new(b"v2".to_vec()));
        blobs.upload(source, Some("b1"), Params::new()).unwrap();

        assert_eq!(blobs.last_insert_id(), None);
        let call = &c.transport().calls()[0];
        assert_eq!(call.method, HttpMethod::Put);
        assert_eq!(call.path, "vaults/v1/blobs/b1");
    }

    #[test]
    fn upload_from_missing_file_never_calls_transport() {
        let c = client(ScriptedTransport::default());
        let err = c
            .blobs("v1")
            .upload_from("/no/such/input.bin", None, Params::new())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::File);
        assert!(c.transport().calls().is_empty());
    }

    #[test]
    fn download_marks_the_transfer() {
        let c = client(ScriptedTransport::default().reply_json(200, json!({})));
        let sink = TransferHandle::from_writer("out", Vec::new());
        c.blobs("v1").download("b1", sink, Params::new()).unwrap();

        let call = &c.transport().calls()[0];
        assert_eq!(call.method, HttpMethod::Get);
        assert_eq!(call.path, "vaults/v1/blobs/b1");
        assert_eq!(call.transfer, "download");
    }
}
