use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::error::{TelemetryError, ValidationError};

#[derive(Debug)]
pub enum AppError {
    Unauthorized,
    Validation(ValidationError),
    Internal(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "invalid token" })),
            )
                .into_response(),
            AppError::Validation(e) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "validation failed", "details": e.errors() })),
            )
                .into_response(),
            AppError::Internal(e) => {
                // Details stay in the logs.
                error!(error = %e, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "internal server error" })),
                )
                    .into_response()
            }
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

impl From<TelemetryError> for AppError {
    fn from(e: TelemetryError) -> Self {
        match e {
            TelemetryError::Validation(v) => Self::Validation(v),
            TelemetryError::Storage(s) => Self::Internal(s.into()),
        }
    }
}
