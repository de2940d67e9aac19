//! Common test utilities.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::extract::connect_info::MockConnectInfo;
use axum::http::{Request, Response};
use http_body_util::BodyExt;
use tokio::sync::Mutex;

use polly::mail::{LogMailSender, MailService};
use polly::search::IndexDocuments;
use polly::server::{self, AppState};
use polly::storage::StorageService;
use polly::store::sql::{SqlGenericStore, connect_in_memory};

pub const LOCAL_CLIENT: &str = "127.0.0.1:40000";
pub const REMOTE_CLIENT: &str = "10.1.2.3:40000";

/// Create a test `AppState` over a fresh in-memory database.
pub async fn test_app_state() -> AppState {
    let pool = connect_in_memory().await.unwrap();
    let storage = StorageService::new(Arc::new(SqlGenericStore::new(pool)));
    let (shutdown_tx, _shutdown_rx) = server::shutdown_channel();

    AppState {
        storage: storage.clone(),
        mail: MailService::new(storage.clone(), Arc::new(LogMailSender)),
        documents: IndexDocuments::new(storage),
        admin_token: None,
        api_token: None,
        max_concurrent_requests: 16,
        max_body_bytes: 64 * 1024,
        shutdown_tx: Arc::new(Mutex::new(Some(shutdown_tx))),
    }
}

/// Build the router as seen by a client at `client`.
pub fn app_for(state: AppState, client: &str) -> Router {
    let addr: SocketAddr = client.parse().unwrap();
    server::build_app(state, Duration::from_secs(30)).layer(MockConnectInfo(addr))
}

/// Create a test app reached from loopback.
pub async fn test_app() -> Router {
    app_for(test_app_state().await, LOCAL_CLIENT)
}

pub fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-user-ident", "Z990001")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}
