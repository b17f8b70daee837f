//! Per-user key lifecycle
//!
//! The manager holds no state of its own: every call reads the user's slot
//! from the injected [`KeyProfileStore`]. Private keys are generated here,
//! handed back to the caller exactly once, and never written anywhere.
//!
//! Concurrent first-time generation for the same user is arbitrated by the
//! store's [`KeyProfileStore::provision_public_key`]; a losing generator throws
//! its pair away and reports the winner's key.

use std::sync::Arc;
use tracing::{error, info, warn};

use imprint_core::{ImprintError, KeyPair, KeyStatus, PublicKey, Result};

use crate::storage::{KeyProfileStore, ProvisionOutcome};

/// Result of [`KeyManager::ensure_public_key`]
#[derive(Clone)]
pub struct EnsureOutcome {
    /// Whether a usable key already existed (or a concurrent call provisioned one)
    pub exists: bool,
    /// The user's current public key export
    pub public_key: String,
    /// Present only when this call generated the pair; export it to the user now
    pub private_key: Option<String>,
}

impl std::fmt::Debug for EnsureOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnsureOutcome")
            .field("exists", &self.exists)
            .field("private_key", &self.private_key.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

/// A freshly generated pair, both halves exported
#[derive(Clone)]
pub struct GeneratedKey {
    pub public_key: String,
    pub private_key: String,
}

impl std::fmt::Debug for GeneratedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("GeneratedKey([redacted])")
    }
}

/// Generates, persists and resolves user key pairs
#[derive(Debug, Clone)]
pub struct KeyManager {
    store: Arc<dyn KeyProfileStore>,
}

impl KeyManager {
    pub fn new(store: Arc<dyn KeyProfileStore>) -> Self {
        Self { store }
    }

    /// Classify the user's key slot
    pub async fn key_status(&self, user_id: &str) -> Result<KeyStatus> {
        let record = self
            .store
            .get_key_record(user_id)
            .await
            .map_err(|e| e.into_key_store())?;
        Ok(KeyStatus::of(record.as_ref()))
    }

    /// Make sure the user has a usable public key
    ///
    /// Idempotent. An unprovisioned slot (missing, or still holding the
    /// account-creation placeholder) gets a new pair; a provisioned one is
    /// reported as existing. A slot whose stored key no longer imports is
    /// reported as [`ImprintError::MalformedKey`]; repairing it takes an
    /// explicit [`KeyManager::regenerate_key_pair`].
    pub async fn ensure_public_key(&self, user_id: &str) -> Result<EnsureOutcome> {
        require_user(user_id)?;

        match self.key_status(user_id).await? {
            KeyStatus::Provisioned(key) => {
                return Ok(EnsureOutcome {
                    exists: true,
                    public_key: key.to_export()?,
                    private_key: None,
                });
            }
            KeyStatus::Broken(reason) => {
                warn!(user_id = %user_id, reason = %reason, "Stored public key is malformed");
                return Err(ImprintError::MalformedKey(reason));
            }
            KeyStatus::Unprovisioned => {}
        }

        let generated = generate_exported().await?;

        let outcome = self
            .store
            .provision_public_key(user_id, &generated.public_key)
            .await
            .map_err(|e| {
                error!(user_id = %user_id, error = %e, "Failed to persist generated public key");
                e.into_key_store()
            })?;

        match outcome {
            ProvisionOutcome::Provisioned(_) => {
                info!(user_id = %user_id, "Generated key pair for user");
                Ok(EnsureOutcome {
                    exists: false,
                    public_key: generated.public_key,
                    private_key: Some(generated.private_key),
                })
            }
            ProvisionOutcome::AlreadyProvisioned(existing) => {
                info!(
                    user_id = %user_id,
                    "Concurrent provisioning won; discarding locally generated pair"
                );
                Ok(EnsureOutcome {
                    exists: true,
                    public_key: existing.public_key,
                    private_key: None,
                })
            }
        }
    }

    /// Replace the user's key pair unconditionally
    ///
    /// Destructive: every image signed under the previous key stops verifying.
    pub async fn regenerate_key_pair(&self, user_id: &str) -> Result<GeneratedKey> {
        require_user(user_id)?;

        let generated = generate_exported().await?;
        self.store
            .upsert_public_key(user_id, &generated.public_key)
            .await
            .map_err(|e| {
                error!(user_id = %user_id, error = %e, "Failed to replace public key");
                e.into_key_store()
            })?;

        warn!(user_id = %user_id, "Regenerated key pair; earlier signatures are no longer verifiable");
        Ok(generated)
    }

    /// Resolve the user's public key for verification
    ///
    /// Missing and placeholder slots are [`ImprintError::KeyNotFound`]; a
    /// stored value that fails to import is [`ImprintError::MalformedKey`].
    pub async fn resolve_public_key(&self, user_id: &str) -> Result<PublicKey> {
        match self.key_status(user_id).await? {
            KeyStatus::Provisioned(key) => Ok(key),
            KeyStatus::Unprovisioned => Err(ImprintError::KeyNotFound(user_id.to_string())),
            KeyStatus::Broken(reason) => Err(ImprintError::MalformedKey(reason)),
        }
    }

    /// The stored public key string, for distribution to verifiers
    pub async fn public_key_export(&self, user_id: &str) -> Result<String> {
        self.store
            .get_public_key(user_id)
            .await
            .map_err(|e| e.into_key_store())?
            .ok_or_else(|| ImprintError::KeyNotFound(user_id.to_string()))
    }
}

fn require_user(user_id: &str) -> Result<()> {
    if user_id.trim().is_empty() {
        return Err(ImprintError::InvalidInput("user id cannot be empty".into()));
    }
    Ok(())
}

/// Generate a pair off the async executor and export both halves
async fn generate_exported() -> Result<GeneratedKey> {
    tokio::task::spawn_blocking(|| -> Result<GeneratedKey> {
        let pair = KeyPair::generate()?;
        Ok(GeneratedKey {
            public_key: pair.public_key().to_export()?,
            private_key: pair.private_key().to_export()?,
        })
    })
    .await
    .map_err(|e| ImprintError::Crypto(format!("key generation task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use imprint_core::{fingerprint, PrivateKey};

    fn manager() -> (KeyManager, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (KeyManager::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_ensure_twice_returns_same_key() {
        let (keys, _) = manager();

        let first = keys.ensure_public_key("alice").await.unwrap();
        assert!(!first.exists);
        assert!(first.private_key.is_some());

        let second = keys.ensure_public_key("alice").await.unwrap();
        assert!(second.exists);
        assert!(second.private_key.is_none());
        assert_eq!(first.public_key, second.public_key);
    }

    #[tokio::test]
    async fn test_exported_private_key_matches_stored_public_key() {
        let (keys, _) = manager();
        let outcome = keys.ensure_public_key("alice").await.unwrap();

        let private = PrivateKey::from_export(outcome.private_key.as_deref().unwrap()).unwrap();
        let public = keys.resolve_public_key("alice").await.unwrap();
        assert_eq!(private.public_key(), public);

        let fp = fingerprint(b"photo");
        let signature = private.sign(&fp).unwrap();
        assert!(public.verify(&fp, &signature).unwrap());
    }

    #[tokio::test]
    async fn test_placeholder_triggers_generation() {
        let (keys, store) = manager();
        store.create_profile("alice").await.unwrap();
        assert!(matches!(keys.key_status("alice").await.unwrap(), KeyStatus::Unprovisioned));

        let outcome = keys.ensure_public_key("alice").await.unwrap();
        assert!(!outcome.exists);
        assert!(matches!(keys.key_status("alice").await.unwrap(), KeyStatus::Provisioned(_)));
    }

    #[tokio::test]
    async fn test_broken_key_is_distinct_from_missing() {
        let (keys, store) = manager();
        store.upsert_public_key("alice", "bm90IGEga2V5").await.unwrap();

        assert!(matches!(
            keys.resolve_public_key("alice").await,
            Err(ImprintError::MalformedKey(_))
        ));
        assert!(matches!(
            keys.resolve_public_key("bob").await,
            Err(ImprintError::KeyNotFound(_))
        ));
        assert!(matches!(
            keys.ensure_public_key("alice").await,
            Err(ImprintError::MalformedKey(_))
        ));
    }

    #[tokio::test]
    async fn test_regenerate_replaces_key() {
        let (keys, _) = manager();
        let original = keys.ensure_public_key("alice").await.unwrap();

        let regenerated = keys.regenerate_key_pair("alice").await.unwrap();
        assert_ne!(regenerated.public_key, original.public_key);
        assert_eq!(keys.public_key_export("alice").await.unwrap(), regenerated.public_key);
    }

    #[tokio::test]
    async fn test_regenerate_repairs_broken_key() {
        let (keys, store) = manager();
        store.upsert_public_key("alice", "garbage").await.unwrap();

        keys.regenerate_key_pair("alice").await.unwrap();
        assert!(keys.resolve_public_key("alice").await.is_ok());
    }

    #[tokio::test]
    async fn test_empty_user_rejected() {
        let (keys, _) = manager();
        assert!(matches!(
            keys.ensure_public_key("  ").await,
            Err(ImprintError::InvalidInput(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_ensure_persists_one_key() {
        let (keys, _) = manager();

        let (a, b, c) = tokio::join!(
            keys.ensure_public_key("carol"),
            keys.ensure_public_key("carol"),
            keys.ensure_public_key("carol"),
        );
        let outcomes = [a.unwrap(), b.unwrap(), c.unwrap()];

        let stored = keys.public_key_export("carol").await.unwrap();
        assert!(outcomes.iter().all(|o| o.public_key == stored));

        let generated: Vec<_> = outcomes.iter().filter(|o| o.private_key.is_some()).collect();
        assert_eq!(generated.len(), 1);
    }
}
