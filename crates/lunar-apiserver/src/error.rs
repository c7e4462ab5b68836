use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use lunar_runtime::RuntimeError;
use serde_json::json;

/// API error type
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found (404)
    NotFound(String),

    /// Resource already exists or is in use (409)
    Conflict(String),

    /// Invalid input (400)
    BadRequest(String),

    /// Operation not allowed on this resource (403)
    Forbidden(String),

    /// Internal server error (500)
    Internal(String),
}

/// Result type for API operations
pub type Result<T> = std::result::Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(json!({
            "status": "Failure",
            "message": message,
            "code": status.as_u16()
        }));

        (status, body).into_response()
    }
}

impl From<RuntimeError> for ApiError {
    fn from(err: RuntimeError) -> Self {
        match &err {
            e if e.is_validation() => ApiError::BadRequest(err.to_string()),
            RuntimeError::NotFound { .. } | RuntimeError::JobNotFound { .. } => {
                ApiError::NotFound(err.to_string())
            }
            RuntimeError::AlreadyExists { .. } => ApiError::Conflict(err.to_string()),
            // execution and decode failures carry the command line and stderr
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<lunar_core::LunarError> for ApiError {
    fn from(err: lunar_core::LunarError) -> Self {
        RuntimeError::from(err).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lunar_core::LunarError;

    #[test]
    fn test_status_mapping() {
        let cases: Vec<(RuntimeError, StatusCode)> = vec![
            (
                LunarError::reserved_name("All").into(),
                StatusCode::BAD_REQUEST,
            ),
            (
                RuntimeError::not_found("LogicalUnit", "600144F0"),
                StatusCode::NOT_FOUND,
            ),
            (RuntimeError::job_not_found("x"), StatusCode::NOT_FOUND),
            (
                RuntimeError::already_exists("HostGroup", "hg1"),
                StatusCode::CONFLICT,
            ),
            (
                RuntimeError::command_failed("zfs destroy tank/v", 1, "dataset is busy"),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                LunarError::decode_failed("View", "stmfadm list-view -l x", "bad LUN").into(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            let response = ApiError::from(err).into_response();
            assert_eq!(response.status(), expected);
        }
    }
}
