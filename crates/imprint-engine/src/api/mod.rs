//! API module for the provenance engine server

pub mod error;
pub mod handlers;

use axum::{
    extract::{DefaultBodyLimit, State},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use handlers::AppState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Readiness check response
#[derive(Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
    pub fingerprint_tolerance: usize,
    pub max_upload_bytes: usize,
}

/// Health check endpoint
///
/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}

/// Readiness check endpoint
///
/// GET /ready
pub async fn ready(State(state): State<Arc<AppState>>) -> Json<ReadyResponse> {
    Json(ReadyResponse {
        ready: true,
        fingerprint_tolerance: state.verifier.matcher().tolerance(),
        max_upload_bytes: state.config.max_upload_bytes,
    })
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Content arrives base64-encoded inside JSON
    let body_limit = state.config.max_upload_bytes / 3 * 4 + 64 * 1024;

    Router::new()
        // Health endpoints
        .route("/health", get(health))
        .route("/ready", get(ready))
        // Key management endpoints
        .route("/v1/keys", post(handlers::ensure_key))
        .route("/v1/keys/regenerate", post(handlers::regenerate_key))
        .route("/v1/keys/status", get(handlers::key_status))
        .route("/v1/keys/{user_id}", get(handlers::get_public_key))
        // Image endpoints
        .route("/v1/images", post(handlers::upload_image).get(handlers::list_images))
        .route("/v1/images/{id}", delete(handlers::delete_image))
        // Verification
        .route("/v1/verify", post(handlers::verify_image))
        // Middleware
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
