//! Imprint Provenance Engine
//!
//! Decides whether an image under inspection is one the requesting user
//! uploaded, unchanged since upload, and still vouched for by their key:
//! - Fingerprints submitted bytes and looks them up in the user's records
//! - Falls back to a name lookup with a bounded fingerprint tolerance
//! - Checks the stored RSA-PSS signature with the owner's current public key
//! - Answers with a classified verdict, failing closed on infrastructure faults
//!
//! ## Guarantees
//!
//! 1. **Ownership**: lookups are scoped to the requesting user
//! 2. **Freshness**: signatures are checked against the fingerprint of the
//!    submitted bytes, never the stored one
//! 3. **Custody**: private keys are returned once at generation and never stored
//!
//! ## API Endpoints
//!
//! - `GET /health` - Liveness check
//! - `GET /ready` - Readiness check with matching settings
//! - `POST /v1/keys` - Ensure the caller has a key pair
//! - `POST /v1/keys/regenerate` - Replace the caller's key pair
//! - `GET /v1/keys/status` - Caller's key slot state
//! - `GET /v1/keys/{user_id}` - A user's public key
//! - `POST /v1/images` - Upload and sign an image
//! - `GET /v1/images` - List the caller's images
//! - `DELETE /v1/images/{id}` - Delete one of the caller's images
//! - `POST /v1/verify` - Verify a file

pub mod api;
pub mod config;
pub mod core;
pub mod keys;
pub mod storage;

pub use api::create_router;
pub use api::handlers::{AppState, RequestingUser};
pub use config::EngineConfig;
pub use core::{
    Candidate, ProvenanceMatcher, RsaPssVerifier, SignatureVerifier, UploadService,
    VerificationOrchestrator,
};
pub use keys::{EnsureOutcome, GeneratedKey, KeyManager};
pub use storage::{
    BlobStore, FsBlobStore, KeyProfileStore, MemoryBlobStore, MemoryStore, ProvisionOutcome,
    RecordStore, StorageError,
};
#[cfg(feature = "postgres")]
pub use storage::PostgresStore;

use std::sync::Arc;

impl AppState {
    /// Wire the engine services over a set of stores
    pub fn new(
        records: Arc<dyn RecordStore>,
        profiles: Arc<dyn KeyProfileStore>,
        blobs: Arc<dyn BlobStore>,
        config: EngineConfig,
    ) -> Self {
        let keys = KeyManager::new(profiles);
        let matcher = ProvenanceMatcher::new(records.clone(), keys.clone(), config.fingerprint_tolerance);
        let uploads = UploadService::new(records, blobs, keys.clone())
            .with_max_upload_bytes(config.max_upload_bytes);

        Self {
            keys,
            uploads,
            verifier: VerificationOrchestrator::new(matcher),
            config,
        }
    }
}
