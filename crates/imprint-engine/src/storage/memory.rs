//! In-memory storage backends
//!
//! Default storage implementation using in-memory hashmaps.
//! Suitable for development, tests and single-instance deployments.
//! Data is lost on restart.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use imprint_core::{Fingerprint, ImageRecord, UserKeyRecord};

use super::{blob_path, BlobStore, KeyProfileStore, ProvisionOutcome, RecordStore, StorageError};

fn poisoned<T>(_: PoisonError<T>) -> StorageError {
    StorageError::Database("in-memory store lock poisoned".into())
}

/// In-memory record and key-profile store
#[derive(Debug, Default)]
pub struct MemoryStore {
    images: RwLock<HashMap<Uuid, ImageRecord>>,
    profiles: RwLock<HashMap<String, UserKeyRecord>>,
}

impl MemoryStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn insert(&self, record: ImageRecord) -> Result<(), StorageError> {
        let mut images = self.images.write().map_err(poisoned)?;
        if images.contains_key(&record.id) {
            return Err(StorageError::AlreadyExists(record.id.to_string()));
        }
        info!(
            id = %record.id,
            owner = %record.owner_user_id,
            file_name = %record.file_name,
            "Inserting image record"
        );
        images.insert(record.id, record);
        Ok(())
    }

    async fn find_by_fingerprint(
        &self,
        fingerprint: &Fingerprint,
        owner_user_id: &str,
    ) -> Result<Option<ImageRecord>, StorageError> {
        let images = self.images.read().map_err(poisoned)?;
        Ok(images
            .values()
            .filter(|r| r.is_owned_by(owner_user_id) && &r.content_fingerprint == fingerprint)
            .max_by_key(|r| r.created_at)
            .cloned())
    }

    async fn find_by_name(
        &self,
        file_name: &str,
        owner_user_id: &str,
    ) -> Result<Option<ImageRecord>, StorageError> {
        let images = self.images.read().map_err(poisoned)?;
        Ok(images
            .values()
            .filter(|r| r.is_owned_by(owner_user_id) && r.file_name == file_name)
            .max_by_key(|r| r.created_at)
            .cloned())
    }

    async fn get(&self, id: Uuid, owner_user_id: &str) -> Result<Option<ImageRecord>, StorageError> {
        let images = self.images.read().map_err(poisoned)?;
        Ok(images.get(&id).filter(|r| r.is_owned_by(owner_user_id)).cloned())
    }

    async fn delete(&self, id: Uuid, owner_user_id: &str) -> Result<Option<ImageRecord>, StorageError> {
        let mut images = self.images.write().map_err(poisoned)?;
        let owned = images.get(&id).is_some_and(|r| r.is_owned_by(owner_user_id));
        if !owned {
            return Ok(None);
        }
        let removed = images.remove(&id);
        info!(id = %id, owner = %owner_user_id, "Deleted image record");
        Ok(removed)
    }

    async fn list_by_owner(&self, owner_user_id: &str) -> Result<Vec<ImageRecord>, StorageError> {
        let images = self.images.read().map_err(poisoned)?;
        let mut owned: Vec<ImageRecord> = images
            .values()
            .filter(|r| r.is_owned_by(owner_user_id))
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(owned)
    }
}

#[async_trait]
impl KeyProfileStore for MemoryStore {
    async fn get_key_record(&self, user_id: &str) -> Result<Option<UserKeyRecord>, StorageError> {
        let profiles = self.profiles.read().map_err(poisoned)?;
        Ok(profiles.get(user_id).cloned())
    }

    async fn create_profile(&self, user_id: &str) -> Result<UserKeyRecord, StorageError> {
        let mut profiles = self.profiles.write().map_err(poisoned)?;
        let record = profiles
            .entry(user_id.to_string())
            .or_insert_with(|| UserKeyRecord::placeholder(user_id));
        Ok(record.clone())
    }

    async fn provision_public_key(
        &self,
        user_id: &str,
        public_key: &str,
    ) -> Result<ProvisionOutcome, StorageError> {
        // Check and write under one lock so concurrent callers cannot both win
        let mut profiles = self.profiles.write().map_err(poisoned)?;
        match profiles.get_mut(user_id) {
            Some(existing) if existing.provisioned => {
                Ok(ProvisionOutcome::AlreadyProvisioned(existing.clone()))
            }
            Some(existing) => {
                existing.public_key = public_key.to_string();
                existing.provisioned = true;
                existing.updated_at = Utc::now();
                info!(user_id = %user_id, "Provisioned public key over placeholder");
                Ok(ProvisionOutcome::Provisioned(existing.clone()))
            }
            None => {
                let record = UserKeyRecord::provisioned(user_id, public_key);
                profiles.insert(user_id.to_string(), record.clone());
                info!(user_id = %user_id, "Provisioned public key");
                Ok(ProvisionOutcome::Provisioned(record))
            }
        }
    }

    async fn upsert_public_key(
        &self,
        user_id: &str,
        public_key: &str,
    ) -> Result<UserKeyRecord, StorageError> {
        let mut profiles = self.profiles.write().map_err(poisoned)?;
        let record = profiles
            .entry(user_id.to_string())
            .or_insert_with(|| UserKeyRecord::placeholder(user_id));
        record.public_key = public_key.to_string();
        record.provisioned = true;
        record.updated_at = Utc::now();
        info!(user_id = %user_id, "Replaced public key");
        Ok(record.clone())
    }
}

/// In-memory blob store
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs
    pub fn len(&self) -> usize {
        self.blobs.read().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, owner_user_id: &str, bytes: &[u8]) -> Result<String, StorageError> {
        let path = blob_path(owner_user_id);
        let mut blobs = self.blobs.write().map_err(poisoned)?;
        blobs.insert(path.clone(), bytes.to_vec());
        debug!(path = %path, size = bytes.len(), "Stored blob");
        Ok(path)
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let blobs = self.blobs.read().map_err(poisoned)?;
        blobs
            .get(path)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(path.to_string()))
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        let mut blobs = self.blobs.write().map_err(poisoned)?;
        blobs
            .remove(path)
            .map(|_| debug!(path = %path, "Deleted blob"))
            .ok_or_else(|| StorageError::NotFound(path.to_string()))
    }
}
