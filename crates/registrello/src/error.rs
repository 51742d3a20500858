use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Error taxonomy shared by every operation.
///
/// All variants are recovered at the operation boundary and rendered as
/// structured JSON; the status-code mapping lives here so the routing layer
/// stays mechanical.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ApiError {
    /// Missing or malformed required fields.
    #[error("{0}")]
    Validation(String),

    /// Referenced roll number, grade or day does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Attempt to overwrite an immutable set-once slot.
    #[error("{0}")]
    Conflict(String),

    /// The mail transport reported a failure.
    #[error("{0}")]
    Delivery(String),

    /// The mail transport is not (fully) configured.
    #[error("{0}")]
    Configuration(String),

    /// Admin token required and not provided or wrong.
    #[error("{0}")]
    Forbidden(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Delivery(_) => StatusCode::BAD_GATEWAY,
            ApiError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
        }
    }

    pub fn student_not_found() -> Self {
        ApiError::NotFound("Student not found".to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
