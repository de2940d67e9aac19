//! Read-only view over generic storage, by type tag.

use axum::Json;
use axum::extract::{Path, State};
use uuid::Uuid;

use super::{list_response, record_response};
use crate::api::{ListRecordsResponse, RecordResponse};
use crate::handlers::ApiError;
use crate::server::AppState;
use crate::storage::StorageType;

fn parse_type(tag: &str) -> Result<StorageType, ApiError> {
    tag.parse()
        .map_err(|_| ApiError::NotFound(format!("unknown storage type '{tag}'")))
}

/// GET /api/v1/storage/{storage_type}
pub async fn list_records(
    State(state): State<AppState>,
    Path(tag): Path<String>,
) -> Result<Json<ListRecordsResponse>, ApiError> {
    let records = state.storage.get_all_of(parse_type(&tag)?).await?;
    Ok(Json(list_response(&records)?))
}

/// GET /api/v1/storage/{storage_type}/{id}
pub async fn get_record(
    State(state): State<AppState>,
    Path((tag, id)): Path<(String, String)>,
) -> Result<Json<RecordResponse>, ApiError> {
    let storage_type = parse_type(&tag)?;
    let id = Uuid::parse_str(&id)
        .map_err(|_| ApiError::BadRequest(format!("'{id}' is not a valid id")))?;
    let record = state.storage.get_record(storage_type, id).await?;
    Ok(Json(record_response(&record)?))
}
