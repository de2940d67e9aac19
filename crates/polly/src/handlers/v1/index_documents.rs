use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use uuid::Uuid;

use super::record_response;
use crate::api::{RecordResponse, SubmitIndexDocumentRequest};
use crate::handlers::ApiError;
use crate::server::AppState;
use crate::storage::Actor;

fn parse_id(id: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(id).map_err(|_| ApiError::BadRequest(format!("'{id}' is not a valid id")))
}

/// POST /api/v1/index-documents
pub async fn submit_index_document(
    State(state): State<AppState>,
    actor: Actor,
    body: Result<Json<SubmitIndexDocumentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RecordResponse>), ApiError> {
    let Json(req) = body?;
    let record = state
        .documents
        .submit(&actor, &req.index, &req.document_id, req.document)
        .await?;
    Ok((StatusCode::CREATED, Json(record_response(&record)?)))
}

/// GET /api/v1/index-documents/{id}
pub async fn get_index_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RecordResponse>, ApiError> {
    let record = state.documents.get(parse_id(&id)?).await?;
    Ok(Json(record_response(&record)?))
}

/// DELETE /api/v1/index-documents/{id}
///
/// Removal from the index happens on the next sync tick.
pub async fn delete_index_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
    actor: Actor,
) -> Result<(StatusCode, Json<RecordResponse>), ApiError> {
    let record = state.documents.mark_deleted(&actor, parse_id(&id)?).await?;
    Ok((StatusCode::ACCEPTED, Json(record_response(&record)?)))
}
