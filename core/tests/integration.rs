//! End-to-end lifecycle tests against the live mock server.
//!
//! # Design
//! Each test starts the mock server on a random port in a background thread
//! with its own tokio runtime, then drives the blocking client over real
//! HTTP. A counting wrapper around `UreqTransport` shows which calls the
//! document cache answered without touching the network.

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::json;
use vault_core::{
    ClientConfig, ErrorKind, MemoryCache, Params, Request, Response, Schema, SchemaField, Transport,
    UreqTransport, VaultClient,
};

const API_KEY: &str = "integration-key";
const ACCOUNT: &str = "integration-account";
const VAULT: &str = "vault-1";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn start_server() -> String {
    init_tracing();
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener, API_KEY, ACCOUNT).await
        })
        .unwrap();
    });

    format!("http://{addr}")
}

fn config(endpoint: &str) -> ClientConfig {
    ClientConfig::new(API_KEY, ACCOUNT).with_endpoint(endpoint)
}

/// Counts round trips that actually reach the network.
struct Counting {
    inner: UreqTransport,
    calls: AtomicUsize,
}

impl Counting {
    fn new(config: ClientConfig) -> Self {
        Self {
            inner: UreqTransport::new(config),
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Transport for Counting {
    fn invoke(&self, request: Request) -> vault_core::Result<Response> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.invoke(request)
    }
}

#[test]
fn lists_account_vaults() {
    let endpoint = start_server();
    let client = VaultClient::new(config(&endpoint));

    let vaults = client.find_all_vaults().unwrap();
    assert_eq!(vaults.len(), 1);
    assert_eq!(vaults[0].id, VAULT);
    assert_eq!(vaults[0].account_id.as_deref(), Some(ACCOUNT));
}

#[test]
fn wrong_api_key_surfaces_server_error() {
    let endpoint = start_server();
    let client = VaultClient::new(ClientConfig::new("bad-key", ACCOUNT).with_endpoint(&endpoint));

    let err = client.find_all_vaults().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Api);
    assert_eq!(err.to_string(), "UnauthorizedError: Invalid API key");
    assert_eq!(err.code().to_string(), "AUTH.INVALID_API_KEY");
}

#[test]
fn document_lifecycle_with_cache() {
    let endpoint = start_server();
    let cfg = config(&endpoint);
    let client = VaultClient::with_transport(cfg.clone(), Counting::new(cfg))
        .with_cache(Arc::new(MemoryCache::new()));
    let mut documents = client.documents(VAULT);

    // Step 1: create records the id and seeds the cache.
    let original = json!({"name": "Don Joe", "uid": 7});
    let created = documents.create(&original, Params::new()).unwrap();
    assert_eq!(created["result"], "success");
    let id = documents.last_insert_id().unwrap().to_string();
    assert_eq!(client.transport().calls(), 1);

    // Step 2: get is answered from the cache.
    assert_eq!(documents.get(&id, Params::new()).unwrap(), Some(original.clone()));
    assert_eq!(client.transport().calls(), 1);

    // Step 3: update goes out and refreshes the cache.
    let changed = json!({"name": "Jane Doe", "uid": 7});
    documents.update(&id, &changed, Params::new()).unwrap();
    assert_eq!(client.transport().calls(), 2);
    assert_eq!(documents.get(&id, Params::new()).unwrap(), Some(changed.clone()));
    assert_eq!(client.transport().calls(), 2);

    // Step 4: the server agrees with the cache.
    let uncached = VaultClient::new(config(&endpoint));
    assert_eq!(
        uncached.documents(VAULT).get(&id, Params::new()).unwrap(),
        Some(changed)
    );

    // Step 5: delete drops the cached copy, so the next get reaches the
    // server and reports the missing document.
    documents.delete(&id, Params::new()).unwrap();
    let err = documents.get(&id, Params::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Api);
    assert_eq!(err.message(), "Document not found");
    assert_eq!(err.code().to_string(), "DOCUMENT.NOT_FOUND");
    assert_eq!(client.transport().calls(), 4);
}

#[test]
fn network_reads_populate_the_cache() {
    let endpoint = start_server();
    let writer = VaultClient::new(config(&endpoint));
    let mut documents = writer.documents(VAULT);
    documents.create(&json!({"n": 1}), Params::new()).unwrap();
    let id = documents.last_insert_id().unwrap().to_string();

    let cfg = config(&endpoint);
    let reader = VaultClient::with_transport(cfg.clone(), Counting::new(cfg))
        .with_cache(Arc::new(MemoryCache::new()));
    let docs = reader.documents(VAULT);
    assert_eq!(docs.get(&id, Params::new()).unwrap(), Some(json!({"n": 1})));
    assert_eq!(docs.get(&id, Params::new()).unwrap(), Some(json!({"n": 1})));
    assert_eq!(reader.transport().calls(), 1);
}

#[test]
fn batch_get_is_all_or_nothing() {
    let endpoint = start_server();
    let cfg = config(&endpoint);
    let client = VaultClient::with_transport(cfg.clone(), Counting::new(cfg))
        .with_cache(Arc::new(MemoryCache::new()));
    let mut documents = client.documents(VAULT);

    documents.create(&json!({"n": 1}), Params::new()).unwrap();
    let a = documents.last_insert_id().unwrap().to_string();
    documents.create(&json!({"n": 2}), Params::new()).unwrap();
    let b = documents.last_insert_id().unwrap().to_string();
    assert_eq!(client.transport().calls(), 2);

    // Both cached: no network.
    let both = documents.get_many(&[&a, &b], Params::new()).unwrap();
    assert_eq!(both[&a], json!({"n": 1}));
    assert_eq!(both[&b], json!({"n": 2}));
    assert_eq!(client.transport().calls(), 2);

    // One evicted: the whole batch comes from the server.
    client.cache().unwrap().delete(VAULT, &b);
    let both = documents.get_many(&[&a, &b], Params::new()).unwrap();
    assert_eq!(both.len(), 2);
    assert_eq!(both[&b], json!({"n": 2}));
    assert_eq!(client.transport().calls(), 3);
}

#[test]
fn search_returns_matching_documents() {
    let endpoint = start_server();
    let client = VaultClient::new(config(&endpoint));

    let mut schemas = client.schemas(VAULT);
    let schema = schemas
        .create(
            &Schema::new(
                "search_by_date",
                vec![
                    SchemaField::indexed("name", "string"),
                    SchemaField::indexed("cdate", "date"),
                ],
            ),
            Params::new(),
        )
        .unwrap();

    let mut documents = client.documents(VAULT);
    let with_schema = Params::new().with("schema_id", schema.id.as_str());
    documents
        .create(&json!({"name": "Jane", "cdate": "2014-08-20"}), with_schema.clone())
        .unwrap();
    documents
        .create(&json!({"name": "Old", "cdate": "2010-05-01"}), with_schema)
        .unwrap();

    let data = documents
        .search(
            &json!({
                "schema_id": schema.id,
                "filter": {"cdate": {"type": "gte", "value": "2012-01-02"}},
                "page": 1,
                "per_page": 10
            }),
            Params::new(),
        )
        .unwrap();

    assert_eq!(data["info"]["total_result_count"], 1);
    let hit = data["documents"][0]["document"].as_str().unwrap();
    assert_eq!(vault_core::codec::decode(hit).unwrap()["name"], "Jane");
}

#[test]
fn schema_lifecycle() {
    let endpoint = start_server();
    let client = VaultClient::new(config(&endpoint));
    let mut schemas = client.schemas(VAULT);

    let input = Schema::new("user", vec![SchemaField::indexed("name", "string")]);
    let created = schemas.create(&input, Params::new()).unwrap();
    assert!(!created.id.is_empty());
    assert_eq!(schemas.last_insert_id(), Some(created.id.as_str()));
    assert_eq!(created.fields, input.fields);

    let all = schemas.find_all(Params::new()).unwrap();
    assert_eq!(all.get(&created.id).map(String::as_str), Some("user"));

    schemas
        .update(&created.id, &Schema::new("renamed", Vec::new()), Params::new())
        .unwrap();
    assert_eq!(schemas.get(&created.id, Params::new()).unwrap().name, "renamed");

    schemas.delete(&created.id, Params::new()).unwrap();
    let err = schemas.get(&created.id, Params::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Api);
    assert_eq!(err.message(), "Schema not found");
}

#[test]
fn blob_upload_download_replace_delete() {
    let endpoint = start_server();
    let client = VaultClient::new(config(&endpoint));
    let mut blobs = client.blobs(VAULT);

    let payload: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
    let mut source = tempfile::NamedTempFile::new().unwrap();
    source.write_all(&payload).unwrap();
    source.flush().unwrap();

    let uploaded = blobs.upload_from(source.path(), None, Params::new()).unwrap();
    let id = blobs.last_insert_id().unwrap().to_string();
    assert_eq!(uploaded["blob_id"], id.as_str());

    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("copy.bin");
    let written = blobs.download_to(&id, target.as_path(), Params::new()).unwrap();
    assert_eq!(written, payload.len() as u64);
    assert_eq!(std::fs::read(&target).unwrap(), payload);

    // Replacing keeps the id.
    let mut replacement = tempfile::NamedTempFile::new().unwrap();
    replacement.write_all(b"second version").unwrap();
    replacement.flush().unwrap();
    blobs
        .upload_from(replacement.path(), Some(&id), Params::new())
        .unwrap();
    blobs.download_to(&id, target.as_path(), Params::new()).unwrap();
    assert_eq!(std::fs::read(&target).unwrap(), b"second version");

    blobs.delete(&id, Params::new()).unwrap();

    // A missing blob answers with a JSON error page, which is not blob
    // content.
    let err = blobs
        .download_to(&id, dir.path().join("gone.bin"), Params::new())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::File);
}

#[test]
fn raw_api_call_reaches_any_path() {
    let endpoint = start_server();
    let client = VaultClient::new(config(&endpoint));

    let response = client
        .api(
            &format!("accounts/{ACCOUNT}/vaults"),
            vault_core::HttpMethod::Get,
            Params::new(),
            vault_core::Transfer::None,
        )
        .unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.body.as_json().unwrap()["vaults"][0]["id"], VAULT);
}

#[cfg(feature = "reqwest")]
#[test]
fn reqwest_backend_handles_form_calls() {
    use vault_core::{ReqwestTransport, TransferHandle};

    let endpoint = start_server();
    let cfg = config(&endpoint);
    let client = VaultClient::with_transport(cfg.clone(), ReqwestTransport::new(cfg).unwrap());

    let mut documents = client.documents(VAULT);
    documents.create(&json!({"via": "reqwest"}), Params::new()).unwrap();
    let id = documents.last_insert_id().unwrap().to_string();
    assert_eq!(
        documents.get(&id, Params::new()).unwrap(),
        Some(json!({"via": "reqwest"}))
    );

    let source = TransferHandle::from_seekable("mem", std::io::Cursor::new(b"bytes".to_vec()));
    let err = client.blobs(VAULT).upload(source, None, Params::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unsupported);
}
