//! Common test utilities

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use takatrack::config::Config;
use takatrack::server::{create_router, AppState};
use takatrack::storage::{create_memory_store, SharedStore, SqliteStore};
use tempfile::TempDir;
use tower::ServiceExt;

/// Build application state over a fresh SQLite database in a temp dir
#[allow(dead_code)]
pub fn sqlite_state() -> (AppState, TempDir) {
    let dir = TempDir::new().unwrap();
    let store: SharedStore = std::sync::Arc::new(SqliteStore::new(dir.path().join("test.db")).unwrap());
    (AppState::new(store, Config::default()).unwrap(), dir)
}

/// Build application state over an in-memory store
#[allow(dead_code)]
pub fn memory_state() -> AppState {
    AppState::new(create_memory_store(), Config::default()).unwrap()
}

/// Send one request through the router and decode the JSON response
#[allow(dead_code)]
pub async fn call(
    router: &Router,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = router.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

/// Router for `state`
#[allow(dead_code)]
pub fn router(state: &AppState) -> Router {
    create_router(state.clone())
}
