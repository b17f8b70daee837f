//! Verification Handler

use axum::{extract::State, Json};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Deserialize;
use std::sync::Arc;

use imprint_core::Verdict;

use super::{AppState, RequestingUser};
use crate::api::error::ApiError;

/// A file submitted for verification
#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub file_name: String,

    /// Base64-encoded file content
    pub content: String,
}

/// Verify a file against the caller's uploads
///
/// POST /v1/verify
///
/// Every verdict, including `error`, is a 200 response; only unusable
/// requests are rejected.
pub async fn verify_image(
    State(state): State<Arc<AppState>>,
    RequestingUser(user_id): RequestingUser,
    Json(request): Json<VerifyRequest>,
) -> Result<Json<Verdict>, ApiError> {
    let bytes = STANDARD.decode(request.content.as_bytes())?;
    if bytes.len() > state.config.max_upload_bytes {
        return Err(ApiError::PayloadTooLarge(format!(
            "file is {} bytes; the limit is {}",
            bytes.len(),
            state.config.max_upload_bytes
        )));
    }

    let verdict = state.verifier.verify(&request.file_name, &bytes, &user_id).await;
    Ok(Json(verdict))
}
