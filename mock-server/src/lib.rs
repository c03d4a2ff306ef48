//! In-memory emulation of the vault REST API for tests and local runs.
//!
//! Every route sits under `/v1` and requires HTTP Basic credentials with the
//! configured API key as user name and an empty password. Errors use the
//! service's envelope: `{"error": {"message", "code", "type"}}`.

use std::{cmp::Ordering, collections::HashMap, sync::Arc};

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Form, Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

const BLOB_LIMIT: usize = 64 * 1024 * 1024;

#[derive(Clone, Debug)]
pub struct StoredDocument {
    pub envelope: String,
    pub schema_id: Option<String>,
}

#[derive(Default)]
pub struct Store {
    pub documents: HashMap<(String, String), StoredDocument>,
    pub schemas: HashMap<(String, String), Value>,
    pub blobs: HashMap<(String, String), Vec<u8>>,
}

pub struct AppState {
    pub api_key: String,
    pub account_id: String,
    pub store: RwLock<Store>,
}

pub type Db = Arc<AppState>;

pub fn app(api_key: &str, account_id: &str) -> Router {
    let state: Db = Arc::new(AppState {
        api_key: api_key.to_string(),
        account_id: account_id.to_string(),
        store: RwLock::new(Store::default()),
    });

    let blobs = Router::new()
        .route("/v1/vaults/{vault}/blobs", axum::routing::post(create_blob))
        .route(
            "/v1/vaults/{vault}/blobs/{id}",
            get(get_blob).put(replace_blob).delete(delete_blob),
        )
        .layer(DefaultBodyLimit::max(BLOB_LIMIT));

    Router::new()
        .route("/v1/accounts/{account}/vaults", get(list_vaults))
        .route("/v1/vaults/{vault}/", get(search_documents))
        .route("/v1/vaults/{vault}/documents", axum::routing::post(create_document))
        .route(
            "/v1/vaults/{vault}/documents/{ids}",
            get(get_documents).put(update_document).delete(delete_document),
        )
        .route(
            "/v1/vaults/{vault}/schemas",
            get(list_schemas).post(create_schema),
        )
        .route(
            "/v1/vaults/{vault}/schemas/{id}",
            get(get_schema).put(update_schema).delete(delete_schema),
        )
        .merge(blobs)
        .layer(middleware::from_fn_with_state(state.clone(), require_api_key))
        .with_state(state)
}

pub async fn run(listener: TcpListener, api_key: &str, account_id: &str) -> Result<(), std::io::Error> {
    axum::serve(listener, app(api_key, account_id)).await
}

pub fn api_error(status: StatusCode, message: &str, code: &str, kind: &str) -> Response {
    (
        status,
        Json(json!({"error": {"message": message, "code": code, "type": kind}})),
    )
        .into_response()
}

fn success(mut body: Value) -> Response {
    if let Value::Object(map) = &mut body {
        map.insert("result".to_string(), json!("success"));
        map.insert("transaction_id".to_string(), json!(Uuid::new_v4()));
    }
    Json(body).into_response()
}

fn decode_envelope(data: &str) -> Option<Value> {
    let bytes = STANDARD.decode(data).ok()?;
    serde_json::from_slice(&bytes).ok()
}

async fn require_api_key(State(state): State<Db>, request: Request, next: Next) -> Response {
    let expected = format!("Basic {}", STANDARD.encode(format!("{}:", state.api_key)));
    let provided = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    if provided == Some(expected.as_str()) {
        next.run(request).await
    } else {
        api_error(
            StatusCode::UNAUTHORIZED,
            "Invalid API key",
            "AUTH.INVALID_API_KEY",
            "UnauthorizedError",
        )
    }
}

// --- vaults ---

async fn list_vaults(State(state): State<Db>, Path(account): Path<String>) -> Response {
    if account != state.account_id {
        return api_error(StatusCode::NOT_FOUND, "Account not found", "ACCOUNT.NOT_FOUND", "NotFoundError");
    }
    success(json!({
        "vaults": [{"id": "vault-1", "name": "default", "account_id": state.account_id}]
    }))
}

// --- documents ---

fn document_not_found() -> Response {
    api_error(StatusCode::NOT_FOUND, "Document not found", "DOCUMENT.NOT_FOUND", "NotFoundError")
}

async fn create_document(
    State(state): State<Db>,
    Path(vault): Path<String>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let Some(envelope) = form.get("document").cloned() else {
        return api_error(StatusCode::BAD_REQUEST, "Missing document", "DOCUMENT.MISSING", "ValidationError");
    };
    let id = Uuid::new_v4().to_string();
    let document = StoredDocument {
        envelope,
        schema_id: form.get("schema_id").cloned(),
    };
    state.store.write().await.documents.insert((vault, id.clone()), document);
    success(json!({"document_id": id}))
}

async fn get_documents(State(state): State<Db>, Path((vault, ids)): Path<(String, String)>) -> Response {
    let store = state.store.read().await;
    let ids: Vec<&str> = ids.split(',').filter(|id| !id.is_empty()).collect();

    if let [id] = ids.as_slice() {
        return match store.documents.get(&(vault, id.to_string())) {
            Some(doc) => Json(doc.envelope.clone()).into_response(),
            None => document_not_found(),
        };
    }

    let documents: Vec<Value> = ids
        .iter()
        .filter_map(|id| {
            store
                .documents
                .get(&(vault.clone(), id.to_string()))
                .map(|doc| json!({"id": id, "document": doc.envelope}))
        })
        .collect();
    success(json!({"documents": documents}))
}

async fn update_document(
    State(state): State<Db>,
    Path((vault, id)): Path<(String, String)>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let mut store = state.store.write().await;
    let Some(doc) = store.documents.get_mut(&(vault, id)) else {
        return document_not_found();
    };
    if let Some(envelope) = form.get("document") {
        doc.envelope = envelope.clone();
    }
    if let Some(schema_id) = form.get("schema_id") {
        doc.schema_id = Some(schema_id.clone());
    }
    success(json!({}))
}

async fn delete_document(State(state): State<Db>, Path((vault, id)): Path<(String, String)>) -> Response {
    match state.store.write().await.documents.remove(&(vault, id)) {
        Some(_) => success(json!({})),
        None => document_not_found(),
    }
}

/// A filter value is either a literal (equality) or
/// `{"type": "eq"|"not"|"gt"|"gte"|"lt"|"lte"|"wildcard", "value": ...}`.
pub fn matches_filter(document: &Value, filter: &serde_json::Map<String, Value>) -> bool {
    filter.iter().all(|(field, condition)| {
        let Some(actual) = document.get(field) else {
            return false;
        };
        let (kind, expected) = match condition {
            Value::Object(c) if c.contains_key("type") => (
                c.get("type").and_then(Value::as_str).unwrap_or("eq"),
                c.get("value").unwrap_or(&Value::Null),
            ),
            other => ("eq", other),
        };
        match kind {
            "eq" => actual == expected,
            "not" => actual != expected,
            "wildcard" => match (actual.as_str(), expected.as_str()) {
                (Some(a), Some(pattern)) => wildcard_match(a, pattern),
                _ => false,
            },
            ordering => match compare(actual, expected) {
                Some(ord) => match ordering {
                    "gt" => ord == Ordering::Greater,
                    "gte" => ord != Ordering::Less,
                    "lt" => ord == Ordering::Less,
                    "lte" => ord != Ordering::Greater,
                    _ => false,
                },
                None => false,
            },
        }
    })
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn wildcard_match(text: &str, pattern: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return text == pattern;
    }
    let mut rest = text;
    for (i, part) in parts.iter().enumerate() {
        if i == 0 {
            match rest.strip_prefix(part) {
                Some(r) => rest = r,
                None => return false,
            }
        } else if i == parts.len() - 1 {
            return rest.ends_with(part);
        } else {
            match rest.find(part) {
                Some(pos) => rest = &rest[pos + part.len()..],
                None => return false,
            }
        }
    }
    true
}

async fn search_documents(
    State(state): State<Db>,
    Path(vault): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let Some(options) = query.get("search_option").and_then(|s| decode_envelope(s)) else {
        return api_error(StatusCode::BAD_REQUEST, "Invalid search option", "SEARCH.INVALID_OPTION", "ValidationError");
    };
    let schema_id = options.get("schema_id").and_then(Value::as_str);
    let empty = serde_json::Map::new();
    let filter = options.get("filter").and_then(Value::as_object).unwrap_or(&empty);

    let store = state.store.read().await;
    let mut documents: Vec<Value> = store
        .documents
        .iter()
        .filter(|((v, _), _)| *v == vault)
        .filter(|(_, doc)| schema_id.is_none() || doc.schema_id.as_deref() == schema_id)
        .filter(|(_, doc)| {
            decode_envelope(&doc.envelope).is_some_and(|value| matches_filter(&value, filter))
        })
        .map(|((_, id), doc)| json!({"document_id": id, "document": doc.envelope}))
        .collect();
    documents.sort_by(|a, b| a["document_id"].as_str().cmp(&b["document_id"].as_str()));

    let total = documents.len();
    success(json!({
        "data": {
            "documents": documents,
            "info": {"current_page": 1, "num_pages": 1, "per_page": 100, "total_result_count": total}
        }
    }))
}

// --- schemas ---

fn schema_not_found() -> Response {
    api_error(StatusCode::NOT_FOUND, "Schema not found", "SCHEMA.NOT_FOUND", "NotFoundError")
}

fn schema_from_form(form: &HashMap<String, String>) -> Option<serde_json::Map<String, Value>> {
    match decode_envelope(form.get("schema")?)? {
        Value::Object(map) if map.get("name").is_some_and(Value::is_string) => Some(map),
        _ => None,
    }
}

fn invalid_schema() -> Response {
    api_error(StatusCode::BAD_REQUEST, "Invalid schema", "SCHEMA.INVALID", "ValidationError")
}

async fn create_schema(
    State(state): State<Db>,
    Path(vault): Path<String>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let Some(mut schema) = schema_from_form(&form) else {
        return invalid_schema();
    };
    let id = Uuid::new_v4().to_string();
    schema.insert("id".to_string(), json!(id));
    schema.insert("vault_id".to_string(), json!(vault));
    let schema = Value::Object(schema);
    state.store.write().await.schemas.insert((vault, id), schema.clone());
    success(json!({"schema": schema}))
}

async fn list_schemas(State(state): State<Db>, Path(vault): Path<String>) -> Response {
    let store = state.store.read().await;
    let mut schemas: Vec<Value> = store
        .schemas
        .iter()
        .filter(|((v, _), _)| *v == vault)
        .map(|(_, schema)| schema.clone())
        .collect();
    schemas.sort_by(|a, b| a["id"].as_str().cmp(&b["id"].as_str()));
    success(json!({"schemas": schemas}))
}

async fn get_schema(State(state): State<Db>, Path((vault, id)): Path<(String, String)>) -> Response {
    match state.store.read().await.schemas.get(&(vault, id)) {
        Some(schema) => success(json!({"schema": schema})),
        None => schema_not_found(),
    }
}

async fn update_schema(
    State(state): State<Db>,
    Path((vault, id)): Path<(String, String)>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let Some(mut schema) = schema_from_form(&form) else {
        return invalid_schema();
    };
    let mut store = state.store.write().await;
    let Some(existing) = store.schemas.get_mut(&(vault.clone(), id.clone())) else {
        return schema_not_found();
    };
    schema.insert("id".to_string(), json!(id));
    schema.insert("vault_id".to_string(), json!(vault));
    *existing = Value::Object(schema);
    success(json!({"schema": existing.clone()}))
}

async fn delete_schema(State(state): State<Db>, Path((vault, id)): Path<(String, String)>) -> Response {
    match state.store.write().await.schemas.remove(&(vault, id)) {
        Some(_) => success(json!({})),
        None => schema_not_found(),
    }
}

// --- blobs ---

fn blob_not_found() -> Response {
    api_error(StatusCode::NOT_FOUND, "Blob not found", "BLOB.NOT_FOUND", "NotFoundError")
}

async fn create_blob(State(state): State<Db>, Path(vault): Path<String>, body: Bytes) -> Response {
    let id = Uuid::new_v4().to_string();
    state.store.write().await.blobs.insert((vault, id.clone()), body.to_vec());
    success(json!({"blob_id": id}))
}

async fn replace_blob(
    State(state): State<Db>,
    Path((vault, id)): Path<(String, String)>,
    body: Bytes,
) -> Response {
    let mut store = state.store.write().await;
    let Some(blob) = store.blobs.get_mut(&(vault, id.clone())) else {
        return blob_not_found();
    };
    *blob = body.to_vec();
    success(json!({"blob_id": id}))
}

async fn get_blob(State(state): State<Db>, Path((vault, id)): Path<(String, String)>) -> Response {
    match state.store.read().await.blobs.get(&(vault, id)) {
        Some(bytes) => (
            [(header::CONTENT_TYPE, "application/octet-stream")],
            bytes.clone(),
        )
            .into_response(),
        None => blob_not_found(),
    }
}

async fn delete_blob(State(state): State<Db>, Path((vault, id)): Path<(String, String)>) -> Response {
    match state.store.write().await.blobs.remove(&(vault, id)) {
        Some(_) => success(json!({})),
        None => blob_not_found(),
    }
}
