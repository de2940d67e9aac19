//! Application settings handlers.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use tracing::info;

use crate::handlers::ApiError;
use crate::server::AppState;
use crate::storage::{Actor, Settings};

/// GET /api/v1/settings
pub async fn get_settings(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<Json<Settings>, ApiError> {
    Ok(Json(state.storage.get_singleton::<Settings>(&actor).await?))
}

/// PUT /api/v1/settings
///
/// Replaces the whole settings payload.
pub async fn put_settings(
    State(state): State<AppState>,
    actor: Actor,
    body: Result<Json<Settings>, JsonRejection>,
) -> Result<Json<Settings>, ApiError> {
    let Json(settings) = body?;
    let saved = state
        .storage
        .update_singleton::<Settings, _>(&actor, |current| *current = settings)
        .await?;
    info!(actor = %actor, "Settings updated");
    Ok(Json(saved))
}
