//! Signing at upload, plus owner-scoped listing and deletion
//!
//! Upload is a two-step commit: the blob is written first, then the record.
//! A record is never persisted without its blob and a good signature; if the
//! record insert fails the blob is removed again.

use std::sync::Arc;
use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use imprint_core::{Fingerprint, ImageRecord, ImprintError, NewImage, PrivateKey, Result};

use crate::keys::KeyManager;
use crate::storage::{BlobStore, RecordStore};

/// Default ceiling on uploaded content (20 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct UploadService {
    records: Arc<dyn RecordStore>,
    blobs: Arc<dyn BlobStore>,
    keys: KeyManager,
    max_upload_bytes: usize,
}

impl UploadService {
    pub fn new(records: Arc<dyn RecordStore>, blobs: Arc<dyn BlobStore>, keys: KeyManager) -> Self {
        Self {
            records,
            blobs,
            keys,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_max_upload_bytes(mut self, max_upload_bytes: usize) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }

    /// Fingerprint, sign and store an image for its owner
    ///
    /// `private_key_export` is the owner's exported private key. It is used
    /// for this one signature and dropped; it must belong to the owner's
    /// provisioned public key.
    pub async fn upload(
        &self,
        owner_user_id: &str,
        image: NewImage,
        private_key_export: &str,
    ) -> Result<ImageRecord> {
        if owner_user_id.trim().is_empty() {
            return Err(ImprintError::InvalidInput("user id cannot be empty".into()));
        }
        if image.file_name.trim().is_empty() {
            return Err(ImprintError::InvalidInput("file name cannot be empty".into()));
        }
        if image.bytes.is_empty() {
            return Err(ImprintError::InvalidInput("image content is empty".into()));
        }
        if image.bytes.len() > self.max_upload_bytes {
            return Err(ImprintError::InvalidInput(format!(
                "image is {} bytes; the limit is {}",
                image.bytes.len(),
                self.max_upload_bytes
            )));
        }

        let fingerprint = Fingerprint::of(&image.bytes);
        let signature = self.sign_for(owner_user_id, &fingerprint, private_key_export).await?;

        let storage_path = self
            .blobs
            .put(owner_user_id, &image.bytes)
            .await
            .map_err(|e| {
                error!(user_id = %owner_user_id, error = %e, "Failed to store image blob");
                e.into_storage()
            })?;

        let record = ImageRecord {
            id: Uuid::new_v4(),
            owner_user_id: owner_user_id.to_string(),
            file_name: image.file_name,
            file_size: image.bytes.len() as u64,
            file_type: image.file_type,
            content_fingerprint: fingerprint,
            signature,
            storage_path,
            created_at: Utc::now(),
        };

        if let Err(e) = self.records.insert(record.clone()).await {
            error!(user_id = %owner_user_id, error = %e, "Failed to insert image record; rolling back blob");
            if let Err(cleanup) = self.blobs.delete(&record.storage_path).await {
                error!(
                    path = %record.storage_path,
                    error = %cleanup,
                    "Blob rollback failed; orphaned blob left behind"
                );
            }
            return Err(e.into_storage());
        }

        info!(
            user_id = %owner_user_id,
            image_id = %record.id,
            file_name = %record.file_name,
            fingerprint = %record.content_fingerprint,
            "Image uploaded and signed"
        );
        Ok(record)
    }

    /// The owner's images, newest first
    pub async fn list(&self, owner_user_id: &str) -> Result<Vec<ImageRecord>> {
        self.records
            .list_by_owner(owner_user_id)
            .await
            .map_err(|e| e.into_storage())
    }

    /// Delete one of the owner's images
    ///
    /// Returns `Ok(None)` when the owner has no such image. The record goes
    /// first; a blob that cannot be removed afterwards is only logged.
    pub async fn delete(&self, id: Uuid, owner_user_id: &str) -> Result<Option<ImageRecord>> {
        let Some(record) = self
            .records
            .delete(id, owner_user_id)
            .await
            .map_err(|e| e.into_storage())?
        else {
            return Ok(None);
        };

        if let Err(e) = self.blobs.delete(&record.storage_path).await {
            warn!(
                image_id = %id,
                path = %record.storage_path,
                error = %e,
                "Record deleted but blob removal failed"
            );
        }

        info!(user_id = %owner_user_id, image_id = %id, "Image deleted");
        Ok(Some(record))
    }

    /// Sign with the caller's key after checking it is the owner's
    async fn sign_for(
        &self,
        owner_user_id: &str,
        fingerprint: &Fingerprint,
        private_key_export: &str,
    ) -> Result<String> {
        let private_key = PrivateKey::from_export(private_key_export)?;
        let provisioned = self.keys.resolve_public_key(owner_user_id).await?;

        if private_key.public_key() != provisioned {
            warn!(user_id = %owner_user_id, "Upload signed with a key that is not the owner's");
            return Err(ImprintError::KeyMismatch(owner_user_id.to_string()));
        }

        private_key.sign(fingerprint)
    }
}
