//! Unified error handling for the Mandrill emulator

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Mandrill-style error name reported next to the message
    pub fn name(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "Unknown_Message",
            AppError::BadRequest(_) => "ValidationError",
            AppError::Unauthorized(_) => "Invalid_Key",
            AppError::Internal(_) => "GeneralError",
        }
    }
}

/// Error response body
///
/// `error` carries the human-readable message, which is the field the
/// Mandrill client libraries surface.
#[derive(Serialize)]
struct ErrorResponse {
    status: &'static str,
    error: String,
    name: &'static str,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            status: "error",
            error: message,
            name: self.name(),
        });

        (status, body).into_response()
    }
}
