use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

/// API response wrapper
pub struct ApiResponse<T: Serialize> {
    status: StatusCode,
    body: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a new response with 200 OK
    pub fn ok(body: T) -> Self {
        Self {
            status: StatusCode::OK,
            body,
        }
    }

    /// Create a new response with 201 Created
    pub fn created(body: T) -> Self {
        Self {
            status: StatusCode::CREATED,
            body,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// 200 with a Success status body
pub fn status_success(message: impl Into<String>) -> Response {
    Json(json!({
        "status": "Success",
        "message": message.into(),
        "code": 200
    }))
    .into_response()
}

/// 202 carrying the identifier of the job doing the work
pub fn job_accepted(job: Uuid) -> Response {
    (StatusCode::ACCEPTED, Json(json!({ "job": job }))).into_response()
}
