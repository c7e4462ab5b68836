use crate::response::ApiResponse;
use crate::{ApiError, AppState, Result};
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// GET /jobs/{id}
///
/// `status` is the free text persisted for the job: "In Progress",
/// "Completed Successfully" or the failure message.
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response> {
    let id = Uuid::parse_str(&id)
        .map_err(|e| ApiError::BadRequest(format!("invalid job id {}: {}", id, e)))?;
    let job = state.jobs.status(id).await?;

    Ok(ApiResponse::ok(json!({
        "id": job.id,
        "description": job.description,
        "status": job.status.as_text(),
        "done": job.status.is_terminal(),
        "submittedAt": job.submitted_at,
        "finishedAt": job.finished_at,
    }))
    .into_response())
}
