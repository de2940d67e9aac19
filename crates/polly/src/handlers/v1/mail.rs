use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;

use super::{list_response, record_response};
use crate::api::{EnqueueMailRequest, ListRecordsResponse, RecordResponse};
use crate::handlers::ApiError;
use crate::server::AppState;
use crate::storage::{Actor, MailTask};

/// POST /api/v1/mail
pub async fn enqueue_mail(
    State(state): State<AppState>,
    actor: Actor,
    body: Result<Json<EnqueueMailRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RecordResponse>), ApiError> {
    let Json(req) = body?;
    let task = MailTask {
        to: req.to,
        subject: req.subject,
        body: req.body,
    };
    let record = state.mail.enqueue(&actor, task).await?;
    Ok((StatusCode::CREATED, Json(record_response(&record)?)))
}

/// GET /api/v1/mail
pub async fn list_mail(
    State(state): State<AppState>,
) -> Result<Json<ListRecordsResponse>, ApiError> {
    let queued = state.mail.queued().await?;
    Ok(Json(list_response(&queued)?))
}
