use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use labelkit_core::LabelError;

// ==============================================================================
// Error Type
// ==============================================================================

#[derive(Debug)]
pub(crate) enum AppError {
    BadRequest(String),
    Unauthorized(String),
    NotFound(String),
    Unavailable(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

pub(super) fn map_label_error(err: LabelError) -> AppError {
    match err {
        LabelError::Unauthorized(_) => AppError::Unauthorized(err.to_string()),
        LabelError::Validation(_) | LabelError::UnsupportedTarget(_) => {
            AppError::BadRequest(err.to_string())
        }
        LabelError::Cancelled => AppError::Unavailable(err.to_string()),
        LabelError::Store { op, ref source } => {
            tracing::error!(op, error = %source, "label store failure");
            AppError::Internal(format!("{op} failed"))
        }
    }
}
