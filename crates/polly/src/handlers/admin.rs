//! Admin handlers for server management.
//!
//! Authorization:
//! - If `admin_token` is configured: requires `Authorization: Bearer <token>` header
//! - If `admin_token` is not configured: only accepts requests from localhost

use std::net::SocketAddr;

use axum::Json;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::info;

use super::api_auth;
use super::problem_details::ApiError;
use crate::api::UnlockResponse;
use crate::server::AppState;
use crate::storage::Actor;

fn require_admin(state: &AppState, addr: &SocketAddr, headers: &HeaderMap) -> Result<(), ApiError> {
    if api_auth::is_authorized(&state.admin_token, addr, headers) {
        Ok(())
    } else {
        Err(ApiError::Forbidden("admin access denied".to_string()))
    }
}

/// POST /api/admin/v1/shutdown
///
/// Triggers a graceful server shutdown.
pub async fn shutdown(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    require_admin(&state, &addr, &headers)?;

    if let Some(tx) = state.shutdown_tx.lock().await.take() {
        let _ = tx.send(());
        Ok((StatusCode::OK, "Shutdown initiated").into_response())
    } else {
        Ok((StatusCode::CONFLICT, "Shutdown already in progress").into_response())
    }
}

/// POST /api/admin/v1/app-state/unlock
///
/// Clears a lock flag left behind by a job that died mid-run.
pub async fn unlock_app_state(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    actor: Actor,
) -> Result<Json<UnlockResponse>, ApiError> {
    require_admin(&state, &addr, &headers)?;

    let was_locked = state.storage.reset_app_state_lock(&actor).await?;
    info!(actor = %actor, was_locked, "Application state unlock requested");
    Ok(Json(UnlockResponse { was_locked }))
}
