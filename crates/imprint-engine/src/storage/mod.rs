//! Storage abstraction for the provenance engine
//!
//! The engine never owns persistence. It is handed three collaborators:
//! - a [`RecordStore`] holding image metadata rows
//! - a [`KeyProfileStore`] holding one public-key slot per user
//! - a [`BlobStore`] holding the uploaded bytes
//!
//! Every record lookup takes the owner id and must filter by it. Returning a
//! record owned by someone else is a security bug, not a cache miss.

pub mod fs;
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use fs::FsBlobStore;
pub use memory::{MemoryBlobStore, MemoryStore};
#[cfg(feature = "postgres")]
pub use postgres::PostgresStore;

use async_trait::async_trait;
use imprint_core::{Fingerprint, ImageRecord, ImprintError, UserKeyRecord};
use std::fmt::Debug;
use uuid::Uuid;

/// Error type for storage operations
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Blob error: {0}")]
    Blob(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Connection error: {0}")]
    Connection(String),
}

impl StorageError {
    /// Map onto the engine taxonomy for failures of the key-profile store
    pub fn into_key_store(self) -> ImprintError {
        ImprintError::KeyStore(self.to_string())
    }

    /// Map onto the engine taxonomy for failures of the record or blob store
    pub fn into_storage(self) -> ImprintError {
        ImprintError::Storage(self.to_string())
    }
}

/// Outcome of the uniqueness-guarded first write of a user's public key
#[derive(Debug, Clone)]
pub enum ProvisionOutcome {
    /// This call wrote the key
    Provisioned(UserKeyRecord),
    /// A provisioned key was already present and has been left untouched
    AlreadyProvisioned(UserKeyRecord),
}

/// Image metadata store
///
/// Implementations must be thread-safe and support concurrent access.
#[async_trait]
pub trait RecordStore: Send + Sync + Debug {
    /// Persist a new record
    async fn insert(&self, record: ImageRecord) -> Result<(), StorageError>;

    /// Find the owner's record with this exact fingerprint
    async fn find_by_fingerprint(
        &self,
        fingerprint: &Fingerprint,
        owner_user_id: &str,
    ) -> Result<Option<ImageRecord>, StorageError>;

    /// Find the owner's most recent record with this file name
    async fn find_by_name(
        &self,
        file_name: &str,
        owner_user_id: &str,
    ) -> Result<Option<ImageRecord>, StorageError>;

    /// Fetch one record by id, scoped to the owner
    async fn get(&self, id: Uuid, owner_user_id: &str) -> Result<Option<ImageRecord>, StorageError>;

    /// Delete a record, scoped to the owner; returns the deleted record
    async fn delete(&self, id: Uuid, owner_user_id: &str) -> Result<Option<ImageRecord>, StorageError>;

    /// All of the owner's records, newest first
    async fn list_by_owner(&self, owner_user_id: &str) -> Result<Vec<ImageRecord>, StorageError>;
}

/// Per-user public-key slot store
#[async_trait]
pub trait KeyProfileStore: Send + Sync + Debug {
    /// Fetch the user's slot, provisioned or not
    async fn get_key_record(&self, user_id: &str) -> Result<Option<UserKeyRecord>, StorageError>;

    /// Seed an unprovisioned profile, as account creation does; no-op if one exists
    async fn create_profile(&self, user_id: &str) -> Result<UserKeyRecord, StorageError>;

    /// Write the user's first real public key
    ///
    /// Must be atomic: if a provisioned key already exists it is returned
    /// unchanged as [`ProvisionOutcome::AlreadyProvisioned`].
    async fn provision_public_key(
        &self,
        user_id: &str,
        public_key: &str,
    ) -> Result<ProvisionOutcome, StorageError>;

    /// Unconditionally replace the user's public key
    async fn upsert_public_key(
        &self,
        user_id: &str,
        public_key: &str,
    ) -> Result<UserKeyRecord, StorageError>;

    /// The stored public key string, if the slot is provisioned
    async fn get_public_key(&self, user_id: &str) -> Result<Option<String>, StorageError> {
        Ok(self
            .get_key_record(user_id)
            .await?
            .filter(|r| r.provisioned)
            .map(|r| r.public_key))
    }
}

/// Uploaded bytes, keyed by owner-scoped path
#[async_trait]
pub trait BlobStore: Send + Sync + Debug {
    /// Store bytes for an owner and return their path
    async fn put(&self, owner_user_id: &str, bytes: &[u8]) -> Result<String, StorageError>;

    /// Read bytes back
    async fn get(&self, path: &str) -> Result<Vec<u8>, StorageError>;

    /// Remove bytes; removing a missing path is an error
    async fn delete(&self, path: &str) -> Result<(), StorageError>;
}

/// Owner-scoped blob path: `<owner>/<uuid>`
pub(crate) fn blob_path(owner_user_id: &str) -> String {
    format!("{}/{}", sanitize_segment(owner_user_id), Uuid::new_v4())
}

/// Keep an owner id usable as a single path segment
fn sanitize_segment(segment: &str) -> String {
    segment
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
