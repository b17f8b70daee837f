//! Key Management Handlers
//!
//! Provisioning, rotation and distribution of per-user key pairs. Private
//! keys appear in exactly one response each and are never stored.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use imprint_core::{ImprintError, KeyStatus};

use super::{AppState, RequestingUser};
use crate::api::error::ApiError;

/// Response from key provisioning
#[derive(Debug, Serialize)]
pub struct EnsureKeyResponse {
    pub user_id: String,

    /// Whether a key already existed before this call
    pub exists: bool,

    /// Base64 SPKI public key
    pub public_key: String,

    /// Base64 PKCS#8 private key; only present when this call generated it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
}

/// Response from key regeneration
#[derive(Debug, Serialize)]
pub struct RegenerateKeyResponse {
    pub user_id: String,
    pub public_key: String,
    pub private_key: String,
    pub warning: String,
}

#[derive(Debug, Serialize)]
pub struct KeyStatusResponse {
    pub user_id: String,

    /// `unprovisioned`, `provisioned` or `broken`
    pub status: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PublicKeyResponse {
    pub user_id: String,
    pub public_key: String,
}

/// Ensure the caller has a key pair
///
/// POST /v1/keys
pub async fn ensure_key(
    State(state): State<Arc<AppState>>,
    RequestingUser(user_id): RequestingUser,
) -> Result<Json<EnsureKeyResponse>, ApiError> {
    let outcome = state.keys.ensure_public_key(&user_id).await.map_err(|e| match e {
        ImprintError::MalformedKey(_) => ApiError::Conflict(
            "Stored public key is corrupt; regenerate the key pair to repair it".into(),
        ),
        other => other.into(),
    })?;

    Ok(Json(EnsureKeyResponse {
        user_id,
        exists: outcome.exists,
        public_key: outcome.public_key,
        private_key: outcome.private_key,
    }))
}

/// Replace the caller's key pair
///
/// POST /v1/keys/regenerate
///
/// Images signed under the old key stop verifying.
pub async fn regenerate_key(
    State(state): State<Arc<AppState>>,
    RequestingUser(user_id): RequestingUser,
) -> Result<Json<RegenerateKeyResponse>, ApiError> {
    let generated = state.keys.regenerate_key_pair(&user_id).await?;
    info!(user_id = %user_id, "Key pair regenerated via API");

    Ok(Json(RegenerateKeyResponse {
        user_id,
        public_key: generated.public_key,
        private_key: generated.private_key,
        warning: "Images signed with the previous key will no longer verify".into(),
    }))
}

/// GET /v1/keys/status
pub async fn key_status(
    State(state): State<Arc<AppState>>,
    RequestingUser(user_id): RequestingUser,
) -> Result<Json<KeyStatusResponse>, ApiError> {
    let status = state.keys.key_status(&user_id).await?;
    let label = status.label().to_string();

    let (public_key, reason) = match status {
        KeyStatus::Provisioned(key) => (Some(key.to_export()?), None),
        KeyStatus::Broken(reason) => (None, Some(reason)),
        KeyStatus::Unprovisioned => (None, None),
    };

    Ok(Json(KeyStatusResponse {
        user_id,
        status: label,
        public_key,
        reason,
    }))
}

/// Fetch any user's public key
///
/// GET /v1/keys/{user_id}
pub async fn get_public_key(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<PublicKeyResponse>, ApiError> {
    let public_key = state.keys.public_key_export(&user_id).await?;
    Ok(Json(PublicKeyResponse { user_id, public_key }))
}
