use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::validation::FieldErrors;

/// Application-level errors that map directly to HTTP responses.
///
/// Every variant implements [`IntoResponse`] so Axum handlers can use
/// `Result<impl IntoResponse, AppError>` as their return type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Field-keyed messages, rendered as `{ "<field>": ["message"] }`.
    #[error("validation failed on {} field(s)", .0.len())]
    Validation(FieldErrors),

    #[error("malformed request body: {0}")]
    MalformedBody(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::MalformedBody(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Validation(errors) => (StatusCode::BAD_REQUEST, Json(errors)).into_response(),
            AppError::MalformedBody(message) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "non_field_errors": [message] })),
            )
                .into_response(),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "error": {
                            "code": "internal_error",
                            "message": "Internal server error",
                            "field": null
                        }
                    })),
                )
                    .into_response()
            }
        }
    }
}
