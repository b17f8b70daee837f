//! Filesystem blob store
//!
//! Blobs live under `<base>/<owner>/<uuid>`. Paths handed back to callers are
//! relative to the base directory, and every incoming path is checked so it
//! cannot escape it.

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

use super::{blob_path, BlobStore, StorageError};

/// Blob store backed by a local directory
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    base_path: PathBuf,
}

impl FsBlobStore {
    /// Open (creating if needed) a blob directory
    pub async fn new(base_path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::Blob(format!(
                "failed to create blob directory '{}': {}",
                base_path.display(),
                e
            ))
        })?;

        info!(path = %base_path.display(), "Blob store initialized");
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Resolve a relative blob path, rejecting anything but plain segments
    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(path);
        let mut resolved = self.base_path.clone();
        let mut segments = 0;
        for component in relative.components() {
            match component {
                Component::Normal(segment) => {
                    resolved.push(segment);
                    segments += 1;
                }
                _ => {
                    return Err(StorageError::Blob(format!(
                        "rejected blob path '{}': path traversal",
                        path
                    )))
                }
            }
        }
        if segments == 0 {
            return Err(StorageError::Blob("empty blob path".into()));
        }
        Ok(resolved)
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, owner_user_id: &str, bytes: &[u8]) -> Result<String, StorageError> {
        let path = blob_path(owner_user_id);
        let full = self.resolve(&path)?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::Blob(format!("failed to create '{}': {}", parent.display(), e)))?;
        }
        fs::write(&full, bytes)
            .await
            .map_err(|e| StorageError::Blob(format!("failed to write blob {}: {}", path, e)))?;

        debug!(path = %path, size = bytes.len(), "Stored blob");
        Ok(path)
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let full = self.resolve(path)?;
        match fs::read(&full).await {
            Ok(data) => {
                debug!(path = %path, size = data.len(), "Retrieved blob");
                Ok(data)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(path.to_string()))
            }
            Err(e) => Err(StorageError::Blob(format!("failed to read blob {}: {}", path, e))),
        }
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        let full = self.resolve(path)?;
        match fs::remove_file(&full).await {
            Ok(()) => {
                debug!(path = %path, "Deleted blob");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(path.to_string()))
            }
            Err(e) => Err(StorageError::Blob(format!("failed to delete blob {}: {}", path, e))),
        }
    }
}
