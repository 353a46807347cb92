use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// API error response structure
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
        }
    }
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    PlayerNotFound(String),
    ValidationError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::PlayerNotFound(name) => {
                tracing::debug!(player = %name, "player lookup missed");
                let error_response = ErrorResponse::with_details(
                    "Player not found",
                    format!("{name} has not been seen on the server"),
                );
                (StatusCode::NOT_FOUND, Json(error_response)).into_response()
            }
            AppError::ValidationError(msg) => {
                tracing::warn!(validation_error = %msg, "Validation failed");
                let error_response = ErrorResponse::new(msg);
                (StatusCode::BAD_REQUEST, Json(error_response)).into_response()
            }
        }
    }
}

impl From<crate::validation::ValidationError> for AppError {
    fn from(err: crate::validation::ValidationError) -> Self {
        AppError::ValidationError(err.to_string())
    }
}
