//! Purpose: Loopback stub of the server HTTP surface for integration tests.
//! Exports: `StubServer`, `TestResult`.
//! Role: Answers the documented endpoints with canned or echoed JSON.
//! Invariants: Binds 127.0.0.1 on an ephemeral port; one runtime thread per server.
//! Invariants: Database `db1` exists; `missing` answers 404, `crashing` answers 500,
//! Invariants: and any other database answers 503.
#![allow(dead_code)]

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use tokio::sync::oneshot;

pub type TestResult<T> = Result<T, Box<dyn std::error::Error>>;

pub const EXISTING_DATABASE: &str = "db1";
pub const CURRENT_CHANGE_VECTOR: &str = "A:1-abc";

#[derive(Clone)]
struct StubState {
    base_url: String,
    databases: Arc<Mutex<Vec<String>>>,
}

impl StubState {
    fn databases(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
        self.databases
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }
}

pub struct StubServer {
    base_url: String,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl StubServer {
    pub fn start() -> TestResult<Self> {
        Self::start_with_databases(&["a", "b"])
    }

    pub fn start_with_databases(databases: &[&str]) -> TestResult<Self> {
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        listener.set_nonblocking(true)?;
        let base_url = format!("http://{}", listener.local_addr()?);
        let state = StubState {
            base_url: base_url.clone(),
            databases: Arc::new(Mutex::new(
                databases.iter().map(|name| name.to_string()).collect(),
            )),
        };

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let thread = std::thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_all()
                .build()
                .expect("runtime");
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::from_std(listener).expect("listener");
                axum::serve(listener, router(state))
                    .with_graceful_shutdown(async {
                        let _ = shutdown_rx.await;
                    })
                    .await
                    .expect("serve");
            });
        });

        Ok(Self {
            base_url,
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        })
    }

    pub fn url(&self) -> &str {
        &self.base_url
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// A loopback url nothing listens on.
pub fn closed_url() -> TestResult<String> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(format!("http://{addr}"))
}

fn router(state: StubState) -> Router {
    Router::new()
        .route("/databases", get(database_names))
        .route("/admin/databases", put(create_database).delete(delete_databases))
        .route("/admin/cluster/node", delete(remove_node))
        .route("/cluster/topology", get(cluster_topology))
        .route("/topology", get(topology))
        .route("/unauthorized", get(unauthorized))
        .route("/databases/:db/admin/indexes/stop", post(toggle_indexing))
        .route("/databases/:db/admin/indexes/start", post(toggle_indexing))
        .route("/databases/:db/admin/indexes", put(put_indexes))
        .route("/databases/:db/stats", get(statistics))
        .route("/databases/:db/docs", put(put_document))
        .route("/databases/:db/queries", post(query))
        .route("/databases/:db/streams/queries", post(stream_query))
        .route("/databases/:db/garbage", get(garbage))
        .fallback(invalid_command)
        .with_state(state)
}

fn database_failure(db: &str) -> Response {
    let body = Json(json!({
        "Type": "Raven.Server.Exceptions.Database.DatabaseDoesNotExistException",
        "Message": format!("Database '{db}' was not found"),
    }));
    match db {
        "missing" => StatusCode::NOT_FOUND.into_response(),
        "crashing" => (StatusCode::INTERNAL_SERVER_ERROR, body).into_response(),
        _ => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}

async fn database_names(
    State(state): State<StubState>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    let start = params
        .get("start")
        .and_then(|raw| raw.parse::<usize>().ok())
        .unwrap_or(0);
    let page_size = params
        .get("pageSize")
        .and_then(|raw| raw.parse::<usize>().ok())
        .unwrap_or(usize::MAX);
    let names: Vec<String> = state
        .databases()
        .iter()
        .skip(start)
        .take(page_size)
        .cloned()
        .collect();
    Json(json!({ "Databases": names }))
}

async fn create_database(
    State(state): State<StubState>,
    Query(params): Query<HashMap<String, String>>,
    body: Bytes,
) -> Response {
    let Ok(record) = serde_json::from_slice::<Value>(&body) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    let name = params.get("name").cloned().unwrap_or_default();
    if record["DatabaseName"] != Value::String(name.clone()) {
        return StatusCode::BAD_REQUEST.into_response();
    }
    let mut databases = state.databases();
    if databases.contains(&name) {
        return (
            StatusCode::CONFLICT,
            Json(json!({
                "Type": "Raven.Client.Exceptions.ConcurrencyException",
                "Message": format!("Database '{name}' already exists!"),
            })),
        )
            .into_response();
    }
    databases.push(name.clone());
    Json(json!({
        "RaftCommandIndex": 7,
        "Name": name,
        "NodesAddedTo": [state.base_url],
        "Topology": { "Members": ["A"], "ReplicationFactor": 1 },
    }))
    .into_response()
}

async fn delete_databases(State(state): State<StubState>, body: Bytes) -> Response {
    let Ok(parameters) = serde_json::from_slice::<Value>(&body) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    let names: Vec<String> = parameters["DatabaseNames"]
        .as_array()
        .map(|names| {
            names
                .iter()
                .filter_map(|name| name.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();
    state.databases().retain(|name| !names.contains(name));
    Json(json!({ "RaftCommandIndex": 9, "PendingDeletes": [] })).into_response()
}

async fn remove_node(Query(params): Query<HashMap<String, String>>, body: Bytes) -> Response {
    let Some(tag) = params.get("nodeTag") else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    let echoed = serde_json::from_slice::<Value>(&body)
        .ok()
        .filter(Value::is_object)
        .unwrap_or_else(|| json!({ "Node": tag, "Tag": tag }));
    Json(echoed).into_response()
}

async fn cluster_topology(State(state): State<StubState>) -> Json<Value> {
    Json(json!({
        "Leader": "A",
        "NodeTag": "A",
        "Topology": {
            "TopologyId": "f3e1",
            "AllNodes": { "A": state.base_url },
            "Members": { "A": state.base_url },
            "LastNodeId": "A",
        },
    }))
}

async fn topology(
    State(state): State<StubState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let name = params.get("name").cloned().unwrap_or_default();
    if name != EXISTING_DATABASE {
        return database_failure(&name);
    }
    Json(json!({
        "Etag": 1,
        "Nodes": [{ "Url": state.base_url, "Database": name, "ClusterTag": "A" }],
    }))
    .into_response()
}

async fn unauthorized() -> StatusCode {
    StatusCode::UNAUTHORIZED
}

async fn toggle_indexing(Path(db): Path<String>) -> Response {
    if db == EXISTING_DATABASE {
        StatusCode::NO_CONTENT.into_response()
    } else {
        database_failure(&db)
    }
}

async fn put_indexes(Path(db): Path<String>, body: Bytes) -> Response {
    if db != EXISTING_DATABASE {
        return database_failure(&db);
    }
    let Ok(payload) = serde_json::from_slice::<Value>(&body) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    let results: Vec<Value> = payload["Indexes"]
        .as_array()
        .map(|indexes| {
            indexes
                .iter()
                .map(|index| json!({ "Index": index["Name"], "RaftCommandIndex": 11 }))
                .collect()
        })
        .unwrap_or_default();
    Json(json!({ "Results": results })).into_response()
}

async fn statistics(Path(db): Path<String>) -> Response {
    if db != EXISTING_DATABASE {
        return database_failure(&db);
    }
    Json(json!({
        "CountOfIndexes": 1,
        "CountOfDocuments": 1059,
        "DatabaseId": "xu9FVL0c",
        "Is64Bit": true,
        "Pager": "Voron.Impl.Paging.RvnMemoryMapPager",
        "SizeOnDisk": { "HumaneSize": "2.19 MBytes", "SizeInBytes": 2293760 },
        "Indexes": [{ "Name": "Orders/Totals", "IsStale": false, "Type": "Map" }],
    }))
    .into_response()
}

async fn put_document(
    Path(db): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if db != EXISTING_DATABASE {
        return database_failure(&db);
    }
    if let Some(expected) = headers.get("If-Match").and_then(|v| v.to_str().ok()) {
        if expected.trim_matches('"') != CURRENT_CHANGE_VECTOR {
            return (
                StatusCode::CONFLICT,
                Json(json!({
                    "Type": "Raven.Client.Exceptions.ConcurrencyException",
                    "Message": "Optimistic concurrency violation",
                })),
            )
                .into_response();
        }
    }
    let Ok(document) = serde_json::from_slice::<Value>(&body) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    let mut id = params.get("id").cloned().unwrap_or_default();
    if id.ends_with('/') {
        id.push_str("0000000000000000001-A");
    }
    let collection = document["@metadata"]["@collection"].clone();
    Json(json!({
        "Id": id,
        "ChangeVector": CURRENT_CHANGE_VECTOR,
        "Collection": collection,
    }))
    .into_response()
}

async fn query(Path(db): Path<String>, headers: HeaderMap, body: Bytes) -> Response {
    if db != EXISTING_DATABASE {
        return database_failure(&db);
    }
    let Ok(index_query) = serde_json::from_slice::<Value>(&body) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    let no_cache = headers
        .get("Cache-Control")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == "no-cache");
    let result_etag = if no_cache { 0 } else { 42 };
    Json(json!({
        "Results": [index_query],
        "TotalResults": 1,
        "IndexName": "Auto/Users/ByName",
        "IsStale": false,
        "ResultEtag": result_etag,
    }))
    .into_response()
}

async fn stream_query(Path(db): Path<String>) -> Response {
    if db != EXISTING_DATABASE {
        return database_failure(&db);
    }
    Json(json!({
        "Results": [
            { "Id": "users/1", "Name": "John" },
            { "Id": "users/2", "Name": "Jane" },
        ],
    }))
    .into_response()
}

async fn garbage() -> &'static str {
    "definitely not json"
}

async fn invalid_command() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({
            "Type": "System.ArgumentException",
            "Message": "There is no handler for this path",
        })),
    )
        .into_response()
}
