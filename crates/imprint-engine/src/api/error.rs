//! API error types and responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

use imprint_core::ImprintError;

/// API error type
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Malformed key: {0}")]
    MalformedKey(String),

    #[error("Key mismatch: {0}")]
    KeyMismatch(String),

    #[error("No public key: {0}")]
    KeyNotFound(String),
}

/// API error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            ApiError::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE", msg),
            ApiError::MalformedKey(msg) => (StatusCode::BAD_REQUEST, "MALFORMED_KEY", msg),
            ApiError::KeyMismatch(msg) => (StatusCode::FORBIDDEN, "KEY_MISMATCH", msg),
            ApiError::KeyNotFound(msg) => (StatusCode::NOT_FOUND, "KEY_NOT_FOUND", msg),
            ApiError::Internal(detail) => {
                // Detail stays in the log; the caller only gets the reference
                let reference = Uuid::new_v4();
                error!(reference = %reference, error = %detail, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    format!("Internal error (reference {})", reference),
                )
            }
        };

        let body = ErrorResponse {
            error: message,
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<ImprintError> for ApiError {
    fn from(err: ImprintError) -> Self {
        match err {
            ImprintError::InvalidInput(msg) => ApiError::BadRequest(msg),
            ImprintError::MalformedKey(msg) => ApiError::MalformedKey(msg),
            ImprintError::MalformedSignature(msg) => {
                ApiError::BadRequest(format!("Malformed signature: {}", msg))
            }
            err @ ImprintError::KeyMismatch(_) => ApiError::KeyMismatch(err.to_string()),
            err @ ImprintError::KeyNotFound(_) => ApiError::KeyNotFound(err.to_string()),
            ImprintError::Io(_)
            | ImprintError::KeyStore(_)
            | ImprintError::Storage(_)
            | ImprintError::Crypto(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<base64::DecodeError> for ApiError {
    fn from(err: base64::DecodeError) -> Self {
        ApiError::BadRequest(format!("Invalid base64 encoding: {}", err))
    }
}
