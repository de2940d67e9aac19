use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tokio::sync::{Mutex, oneshot};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::timeout::TimeoutLayer;

use crate::handlers;
use crate::mail::MailService;
use crate::search::IndexDocuments;
use crate::storage::StorageService;

// ============================================================================
// Application State
// ============================================================================

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub storage: StorageService,
    pub mail: MailService,
    pub documents: IndexDocuments,
    pub admin_token: Option<String>,
    pub api_token: Option<String>,
    pub max_concurrent_requests: usize,
    pub max_body_bytes: usize,
    pub shutdown_tx: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

// ============================================================================
// Server Setup
// ============================================================================

/// Create a shutdown channel pair.
///
/// Returns (sender for AppState, receiver for shutdown_signal).
pub fn shutdown_channel() -> (oneshot::Sender<()>, oneshot::Receiver<()>) {
    oneshot::channel()
}

pub fn build_app(state: AppState, request_timeout: Duration) -> Router {
    let api_v1 = Router::new()
        .route(
            "/settings",
            get(handlers::v1::get_settings).put(handlers::v1::put_settings),
        )
        .route(
            "/mail",
            get(handlers::v1::list_mail).post(handlers::v1::enqueue_mail),
        )
        .route(
            "/index-documents",
            post(handlers::v1::submit_index_document),
        )
        .route(
            "/index-documents/{id}",
            get(handlers::v1::get_index_document).delete(handlers::v1::delete_index_document),
        )
        .route("/storage/{storage_type}", get(handlers::v1::list_records))
        .route(
            "/storage/{storage_type}/{id}",
            get(handlers::v1::get_record),
        )
        .with_state(state.clone())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(DefaultBodyLimit::max(state.max_body_bytes))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            handlers::api_auth::require_api_token,
        ))
        .layer(ConcurrencyLimitLayer::new(state.max_concurrent_requests));

    // Admin handlers check the admin token themselves and answer 403.
    let admin_routes = Router::new()
        .route("/app-state/unlock", post(handlers::unlock_app_state))
        .route("/shutdown", post(handlers::shutdown))
        .with_state(state.clone());

    Router::new()
        .route("/livez", get(handlers::livez))
        .route("/readyz", get(handlers::readyz))
        .route("/version", get(handlers::version))
        .with_state(state)
        .nest("/api/v1", api_v1)
        .nest("/api/admin/v1", admin_routes)
}
