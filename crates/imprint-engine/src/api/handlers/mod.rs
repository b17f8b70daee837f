//! API request handlers

pub mod images;
pub mod keys;
pub mod verify;

use axum::{extract::FromRequestParts, http::request::Parts};
use std::sync::Arc;

use crate::api::error::ApiError;
use crate::config::EngineConfig;
use crate::core::{UploadService, VerificationOrchestrator};
use crate::keys::KeyManager;

pub use images::{delete_image, list_images, upload_image, ImageResponse, ListImagesResponse, UploadImageRequest};
pub use keys::{
    ensure_key, get_public_key, key_status, regenerate_key, EnsureKeyResponse, KeyStatusResponse,
    PublicKeyResponse, RegenerateKeyResponse,
};
pub use verify::{verify_image, VerifyRequest};

/// Application state shared across handlers
#[derive(Debug)]
pub struct AppState {
    pub keys: KeyManager,
    pub uploads: UploadService,
    pub verifier: VerificationOrchestrator,
    pub config: EngineConfig,
}

/// The authenticated caller
///
/// Read from the configured identity header, which the upstream
/// authenticating proxy sets. The value is trusted as-is.
#[derive(Debug, Clone)]
pub struct RequestingUser(pub String);

impl FromRequestParts<Arc<AppState>> for RequestingUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let header = state.config.user_header.as_str();
        let value = parts
            .headers
            .get(header)
            .ok_or_else(|| ApiError::Unauthorized(format!("missing '{}' header", header)))?
            .to_str()
            .map_err(|_| ApiError::Unauthorized(format!("'{}' header is not valid text", header)))?
            .trim();

        if value.is_empty() {
            return Err(ApiError::Unauthorized(format!("'{}' header is empty", header)));
        }
        Ok(RequestingUser(value.to_string()))
    }
}
