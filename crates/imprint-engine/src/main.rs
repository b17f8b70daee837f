//! Imprint Engine Server Binary
//!
//! Runs the provenance HTTP server over the stores selected by configuration.

use std::sync::Arc;
use tracing::info;
use tracing_subscriber::FmtSubscriber;

use imprint_engine::{
    create_router, AppState, BlobStore, EngineConfig, FsBlobStore, KeyProfileStore,
    MemoryBlobStore, MemoryStore, RecordStore,
};

#[tokio::main]
async fn main() {
    let config = EngineConfig::from_env();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.log_level)
        .with_target(true)
        .with_thread_ids(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    // Initialize storage
    let (records, profiles) = record_stores(&config).await;

    let blobs: Arc<dyn BlobStore> = match &config.blob_path {
        Some(path) => Arc::new(
            FsBlobStore::new(path.clone())
                .await
                .expect("Failed to open IMPRINT_BLOB_PATH"),
        ),
        None => {
            info!("IMPRINT_BLOB_PATH not set; image bytes are kept in memory");
            Arc::new(MemoryBlobStore::new())
        }
    };

    info!(
        port = config.port,
        tolerance = config.fingerprint_tolerance,
        user_header = %config.user_header,
        "Starting Imprint engine"
    );

    let port = config.port;
    let state = Arc::new(AppState::new(records, profiles, blobs, config));
    let app = create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    info!(addr = %addr, "Imprint engine listening");

    axum::serve(listener, app)
        .await
        .expect("Server error");
}

#[cfg(feature = "postgres")]
async fn record_stores(config: &EngineConfig) -> (Arc<dyn RecordStore>, Arc<dyn KeyProfileStore>) {
    if let Some(url) = &config.database_url {
        let store = Arc::new(
            imprint_engine::PostgresStore::new(url)
                .await
                .expect("Failed to connect to IMPRINT_DATABASE_URL"),
        );
        let records: Arc<dyn RecordStore> = store.clone();
        return (records, store);
    }
    memory_stores()
}

#[cfg(not(feature = "postgres"))]
async fn record_stores(config: &EngineConfig) -> (Arc<dyn RecordStore>, Arc<dyn KeyProfileStore>) {
    if config.database_url.is_some() {
        tracing::warn!("IMPRINT_DATABASE_URL is set but this build lacks the postgres feature; using memory");
    }
    memory_stores()
}

fn memory_stores() -> (Arc<dyn RecordStore>, Arc<dyn KeyProfileStore>) {
    info!("Using in-memory record and key stores; data is lost on restart");
    let store = Arc::new(MemoryStore::new());
    let records: Arc<dyn RecordStore> = store.clone();
    (records, store)
}
