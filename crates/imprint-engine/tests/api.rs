//! Router tests
//!
//! Requests go through the full axum stack with `tower::ServiceExt::oneshot`,
//! including the identity header extractor and JSON error bodies.

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use imprint_engine::{create_router, AppState, EngineConfig, MemoryBlobStore, MemoryStore};

fn app() -> Router {
    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(
        store.clone(),
        store,
        Arc::new(MemoryBlobStore::new()),
        EngineConfig::default(),
    );
    create_router(Arc::new(state))
}

async fn send(app: &Router, method: &str, uri: &str, user: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        request = request.header("x-user-id", user);
    }
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn provision(app: &Router, user: &str) -> String {
    let (status, body) = send(app, "POST", "/v1/keys", Some(user), None).await;
    assert_eq!(status, StatusCode::OK);
    body["private_key"].as_str().unwrap().to_string()
}

async fn upload(app: &Router, user: &str, name: &str, bytes: &[u8], private_key: &str) -> Value {
    let (status, body) = send(
        app,
        "POST",
        "/v1/images",
        Some(user),
        Some(json!({
            "file_name": name,
            "file_type": "image/png",
            "content": STANDARD.encode(bytes),
            "private_key": private_key,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body
}

async fn verify(app: &Router, user: &str, name: &str, bytes: &[u8]) -> Value {
    let (status, body) = send(
        app,
        "POST",
        "/v1/verify",
        Some(user),
        Some(json!({ "file_name": name, "content": STANDARD.encode(bytes) })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body
}

#[tokio::test]
async fn test_health() {
    let (status, body) = send(&app(), "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_ready_reports_tolerance() {
    let (status, body) = send(&app(), "GET", "/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["fingerprint_tolerance"], 5);
}

#[tokio::test]
async fn test_missing_identity_is_unauthorized() {
    let (status, body) = send(&app(), "POST", "/v1/keys", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_ensure_key_is_idempotent() {
    let app = app();

    let (_, first) = send(&app, "POST", "/v1/keys", Some("alice"), None).await;
    assert_eq!(first["exists"], false);
    assert!(first["private_key"].is_string());

    let (_, second) = send(&app, "POST", "/v1/keys", Some("alice"), None).await;
    assert_eq!(second["exists"], true);
    assert!(second.get("private_key").is_none());
    assert_eq!(first["public_key"], second["public_key"]);

    let (status, published) = send(&app, "GET", "/v1/keys/alice", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(published["public_key"], first["public_key"]);
}

#[tokio::test]
async fn test_key_status_transitions() {
    let app = app();

    let (_, before) = send(&app, "GET", "/v1/keys/status", Some("alice"), None).await;
    assert_eq!(before["status"], "unprovisioned");

    provision(&app, "alice").await;
    let (_, after) = send(&app, "GET", "/v1/keys/status", Some("alice"), None).await;
    assert_eq!(after["status"], "provisioned");
}

#[tokio::test]
async fn test_unknown_public_key_is_not_found() {
    let (status, body) = send(&app(), "GET", "/v1/keys/nobody", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "KEY_NOT_FOUND");
}

#[tokio::test]
async fn test_upload_then_verify_round_trip() {
    let app = app();
    let private_key = provision(&app, "alice").await;
    let uploaded = upload(&app, "alice", "holiday.png", b"original pixels", &private_key).await;

    let verdict = verify(&app, "alice", "holiday.png", b"original pixels").await;
    assert_eq!(verdict["status"], "verified");
    assert_eq!(verdict["image_id"], uploaded["id"]);
    assert_eq!(verdict["matched"]["kind"], "fingerprint");

    let modified = verify(&app, "alice", "holiday.png", b"edited pixels").await;
    assert_eq!(modified["status"], "content_modified");

    let stranger = verify(&app, "bob", "holiday.png", b"original pixels").await;
    assert_eq!(stranger["status"], "not_found");
}

#[tokio::test]
async fn test_upload_with_someone_elses_key_is_forbidden() {
    let app = app();
    provision(&app, "alice").await;
    let mallory_key = provision(&app, "mallory").await;

    let (status, body) = send(
        &app,
        "POST",
        "/v1/images",
        Some("alice"),
        Some(json!({
            "file_name": "forged.png",
            "content": STANDARD.encode(b"forged"),
            "private_key": mallory_key,
        })),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "KEY_MISMATCH");
}

#[tokio::test]
async fn test_bad_base64_is_bad_request() {
    let (status, body) = send(
        &app(),
        "POST",
        "/v1/verify",
        Some("alice"),
        Some(json!({ "file_name": "a.png", "content": "***" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_list_and_delete_images() {
    let app = app();
    let private_key = provision(&app, "alice").await;
    let uploaded = upload(&app, "alice", "one.png", b"1", &private_key).await;
    upload(&app, "alice", "two.png", b"2", &private_key).await;

    let (_, listed) = send(&app, "GET", "/v1/images", Some("alice"), None).await;
    assert_eq!(listed["count"], 2);
    assert_eq!(listed["images"][0]["file_name"], "two.png");

    let uri = format!("/v1/images/{}", uploaded["id"].as_str().unwrap());
    let (status, _) = send(&app, "DELETE", &uri, Some("bob"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "DELETE", &uri, Some("alice"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, listed) = send(&app, "GET", "/v1/images", Some("alice"), None).await;
    assert_eq!(listed["count"], 1);
}
