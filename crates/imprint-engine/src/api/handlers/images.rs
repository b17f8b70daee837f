//! Image Upload Handlers
//!
//! Upload signs the content with the caller-supplied private key; list and
//! delete only ever see the caller's own images.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use imprint_core::{ImageRecord, NewImage};

use super::{AppState, RequestingUser};
use crate::api::error::ApiError;

/// Request to upload and sign an image
#[derive(Debug, Deserialize)]
pub struct UploadImageRequest {
    pub file_name: String,

    /// MIME type as reported by the client
    #[serde(default = "default_file_type")]
    pub file_type: String,

    /// Base64-encoded file content
    pub content: String,

    /// Base64 PKCS#8 private key, used for this signature only
    pub private_key: String,
}

fn default_file_type() -> String {
    "application/octet-stream".into()
}

/// An uploaded image as shown to its owner
#[derive(Debug, Serialize, Deserialize)]
pub struct ImageResponse {
    pub id: Uuid,
    pub file_name: String,
    pub file_size: u64,
    pub file_type: String,
    pub fingerprint: String,
    pub signature: String,
    pub created_at: DateTime<Utc>,
}

impl From<ImageRecord> for ImageResponse {
    fn from(record: ImageRecord) -> Self {
        Self {
            id: record.id,
            file_name: record.file_name,
            file_size: record.file_size,
            file_type: record.file_type,
            fingerprint: record.content_fingerprint.to_string(),
            signature: record.signature,
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListImagesResponse {
    pub images: Vec<ImageResponse>,
    pub count: usize,
}

/// Upload and sign an image
///
/// POST /v1/images
pub async fn upload_image(
    State(state): State<Arc<AppState>>,
    RequestingUser(user_id): RequestingUser,
    Json(request): Json<UploadImageRequest>,
) -> Result<(StatusCode, Json<ImageResponse>), ApiError> {
    let bytes = STANDARD.decode(request.content.as_bytes())?;
    if bytes.len() > state.config.max_upload_bytes {
        return Err(ApiError::PayloadTooLarge(format!(
            "image is {} bytes; the limit is {}",
            bytes.len(),
            state.config.max_upload_bytes
        )));
    }

    let image = NewImage {
        file_name: request.file_name,
        file_type: request.file_type,
        bytes,
    };
    let record = state
        .uploads
        .upload(&user_id, image, &request.private_key)
        .await?;

    Ok((StatusCode::CREATED, Json(record.into())))
}

/// List the caller's images, newest first
///
/// GET /v1/images
pub async fn list_images(
    State(state): State<Arc<AppState>>,
    RequestingUser(user_id): RequestingUser,
) -> Result<Json<ListImagesResponse>, ApiError> {
    let images: Vec<ImageResponse> = state
        .uploads
        .list(&user_id)
        .await?
        .into_iter()
        .map(ImageResponse::from)
        .collect();
    let count = images.len();

    Ok(Json(ListImagesResponse { images, count }))
}

/// Delete one of the caller's images
///
/// DELETE /v1/images/{id}
pub async fn delete_image(
    State(state): State<Arc<AppState>>,
    RequestingUser(user_id): RequestingUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    match state.uploads.delete(id, &user_id).await? {
        Some(_) => Ok(StatusCode::NO_CONTENT),
        None => Err(ApiError::NotFound(format!("image {}", id))),
    }
}
