//! Integration Tests for the Imprint engine
//!
//! These tests drive the services the way the server wires them:
//! - Upload with the caller-held private key, then verify
//! - Every verdict path of the matcher
//! - Ownership isolation between users
//! - Upload rollback when the record store fails

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use imprint_core::{
    crypto, fingerprint, Fingerprint, ImageRecord, ImprintError, KeyPair, MatchKind, NewImage,
    PublicKey, Verdict, VerdictStatus,
};
use imprint_engine::{
    BlobStore, KeyManager, KeyProfileStore, MemoryBlobStore, MemoryStore, ProvenanceMatcher,
    RecordStore, SignatureVerifier, StorageError, UploadService, VerificationOrchestrator,
};

// =============================================================================
// Test Helpers
// =============================================================================

struct Harness {
    store: Arc<MemoryStore>,
    blobs: Arc<MemoryBlobStore>,
    keys: KeyManager,
    uploads: UploadService,
    verifier: VerificationOrchestrator,
    calls: Arc<CountingVerifier>,
}

/// RSA-PSS verifier that counts its invocations
#[derive(Debug, Default)]
struct CountingVerifier {
    calls: AtomicUsize,
}

impl CountingVerifier {
    fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SignatureVerifier for CountingVerifier {
    fn verify(
        &self,
        fingerprint: &Fingerprint,
        signature: &str,
        key: &PublicKey,
    ) -> imprint_core::Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        crypto::verify(fingerprint, signature, key)
    }
}

fn harness(tolerance: usize) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let blobs = Arc::new(MemoryBlobStore::new());
    let keys = KeyManager::new(store.clone());
    let calls = Arc::new(CountingVerifier::default());
    let matcher = ProvenanceMatcher::new(store.clone(), keys.clone(), tolerance)
        .with_verifier(calls.clone());

    Harness {
        uploads: UploadService::new(store.clone(), blobs.clone(), keys.clone()),
        verifier: VerificationOrchestrator::new(matcher),
        store,
        blobs,
        keys,
        calls,
    }
}

fn png(name: &str, bytes: &[u8]) -> NewImage {
    NewImage {
        file_name: name.into(),
        file_type: "image/png".into(),
        bytes: bytes.to_vec(),
    }
}

/// Provision a key for the user and return the private half
async fn provision(h: &Harness, user: &str) -> String {
    h.keys
        .ensure_public_key(user)
        .await
        .expect("ensure key")
        .private_key
        .expect("fresh key")
}

/// Change the first `n` hex characters of a fingerprint
fn shifted(fp: &Fingerprint, n: usize) -> Fingerprint {
    let s: String = fp
        .as_str()
        .chars()
        .enumerate()
        .map(|(i, c)| match (i < n, c) {
            (true, '0') => '1',
            (true, _) => '0',
            (false, c) => c,
        })
        .collect();
    Fingerprint::from_stored(s)
}

fn assert_status(verdict: &Verdict, status: VerdictStatus) {
    assert_eq!(verdict.status, status, "unexpected verdict: {:?}", verdict);
}

// =============================================================================
// Verdict Scenarios
// =============================================================================

#[tokio::test]
async fn test_unchanged_upload_is_verified() {
    let h = harness(5);
    let private_key = provision(&h, "alice").await;
    let record = h
        .uploads
        .upload("alice", png("holiday.png", b"original pixels"), &private_key)
        .await
        .unwrap();

    let verdict = h.verifier.verify("holiday.png", b"original pixels", "alice").await;

    assert_status(&verdict, VerdictStatus::Verified);
    assert_eq!(verdict.matched, Some(MatchKind::Fingerprint));
    assert_eq!(verdict.image_id, Some(record.id));
    assert_eq!(verdict.owner_user_id.as_deref(), Some("alice"));
    assert_eq!(verdict.uploaded_at, Some(record.created_at));
}

#[tokio::test]
async fn test_renamed_copy_is_verified_by_fingerprint() {
    let h = harness(5);
    let private_key = provision(&h, "alice").await;
    h.uploads
        .upload("alice", png("holiday.png", b"original pixels"), &private_key)
        .await
        .unwrap();

    let verdict = h.verifier.verify("copy-of-holiday.png", b"original pixels", "alice").await;
    assert_status(&verdict, VerdictStatus::Verified);
    assert_eq!(verdict.file_name.as_deref(), Some("holiday.png"));
}

#[tokio::test]
async fn test_modified_bytes_same_name_is_content_modified() {
    let h = harness(5);
    let private_key = provision(&h, "alice").await;
    h.uploads
        .upload("alice", png("holiday.png", b"original pixels"), &private_key)
        .await
        .unwrap();

    let verdict = h.verifier.verify("holiday.png", b"edited pixels", "alice").await;

    assert_status(&verdict, VerdictStatus::ContentModified);
    assert_eq!(h.calls.count(), 0, "verifier must not run for modified content");
}

#[tokio::test]
async fn test_unknown_file_is_not_found() {
    let h = harness(5);
    provision(&h, "alice").await;

    let verdict = h.verifier.verify("never-seen.png", b"random bytes", "alice").await;

    assert_status(&verdict, VerdictStatus::NotFound);
    assert_eq!(verdict.fingerprint, Some(fingerprint(b"random bytes")));
    assert_eq!(h.calls.count(), 0);
}

#[tokio::test]
async fn test_owner_without_key_is_key_unavailable() {
    let h = harness(5);
    // A record written directly, as if imported, for an owner who never provisioned
    let signer = KeyPair::generate().unwrap();
    let fp = fingerprint(b"imported pixels");
    h.store
        .insert(ImageRecord {
            id: Uuid::new_v4(),
            owner_user_id: "dave".into(),
            file_name: "import.png".into(),
            file_size: 15,
            file_type: "image/png".into(),
            content_fingerprint: fp.clone(),
            signature: signer.sign(&fp).unwrap(),
            storage_path: "dave/import".into(),
            created_at: chrono::Utc::now(),
        })
        .await
        .unwrap();
    h.store.create_profile("dave").await.unwrap();

    let verdict = h.verifier.verify("import.png", b"imported pixels", "dave").await;

    assert_status(&verdict, VerdictStatus::KeyUnavailable);
    assert_eq!(h.calls.count(), 0);
    // Resolution does not generate a key behind the user's back
    assert!(h.store.get_public_key("dave").await.unwrap().is_none());
}

#[tokio::test]
async fn test_regenerated_key_invalidates_old_signatures() {
    let h = harness(5);
    let private_key = provision(&h, "alice").await;
    h.uploads
        .upload("alice", png("holiday.png", b"original pixels"), &private_key)
        .await
        .unwrap();

    h.keys.regenerate_key_pair("alice").await.unwrap();

    let verdict = h.verifier.verify("holiday.png", b"original pixels", "alice").await;
    assert_status(&verdict, VerdictStatus::SignatureInvalid);
    assert_eq!(h.calls.count(), 1);
}

// =============================================================================
// Ownership
// =============================================================================

#[tokio::test]
async fn test_identical_bytes_never_match_across_users() {
    let h = harness(5);
    let alice_key = provision(&h, "alice").await;
    provision(&h, "bob").await;
    h.uploads
        .upload("alice", png("shared.png", b"identical bytes"), &alice_key)
        .await
        .unwrap();

    let verdict = h.verifier.verify("shared.png", b"identical bytes", "bob").await;

    assert_status(&verdict, VerdictStatus::NotFound);
    assert!(verdict.owner_user_id.is_none());
}

#[tokio::test]
async fn test_each_user_matches_their_own_copy() {
    let h = harness(5);
    let alice_key = provision(&h, "alice").await;
    let bob_key = provision(&h, "bob").await;
    let alice = h
        .uploads
        .upload("alice", png("shared.png", b"identical bytes"), &alice_key)
        .await
        .unwrap();
    let bob = h
        .uploads
        .upload("bob", png("shared.png", b"identical bytes"), &bob_key)
        .await
        .unwrap();

    let for_alice = h.verifier.verify("shared.png", b"identical bytes", "alice").await;
    let for_bob = h.verifier.verify("shared.png", b"identical bytes", "bob").await;

    assert_eq!(for_alice.image_id, Some(alice.id));
    assert_eq!(for_bob.image_id, Some(bob.id));
    assert_status(&for_alice, VerdictStatus::Verified);
    assert_status(&for_bob, VerdictStatus::Verified);
}

// =============================================================================
// Tolerance Boundary
// =============================================================================

/// Store a record under `name` whose fingerprint is `distance` positions away
/// from `bytes`, signed over the fingerprint of `bytes`
async fn seed_shifted(h: &Harness, user: &str, name: &str, bytes: &[u8], distance: usize) {
    let private_key = provision(h, user).await;
    let signer = imprint_core::PrivateKey::from_export(&private_key).unwrap();
    let fresh = fingerprint(bytes);

    h.store
        .insert(ImageRecord {
            id: Uuid::new_v4(),
            owner_user_id: user.into(),
            file_name: name.into(),
            file_size: bytes.len() as u64,
            file_type: "image/png".into(),
            content_fingerprint: shifted(&fresh, distance),
            signature: signer.sign(&fresh).unwrap(),
            storage_path: format!("{}/seed", user),
            created_at: chrono::Utc::now(),
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_exactly_tolerance_reaches_signature_check() {
    let h = harness(5);
    seed_shifted(&h, "alice", "photo.png", b"re-encoded", 5).await;

    let verdict = h.verifier.verify("photo.png", b"re-encoded", "alice").await;

    assert_status(&verdict, VerdictStatus::Verified);
    assert_eq!(verdict.matched, Some(MatchKind::NameTolerated { distance: 5 }));
    assert!(verdict.detail.contains("minor fingerprint difference"));
    assert_eq!(h.calls.count(), 1);
}

#[tokio::test]
async fn test_one_past_tolerance_is_content_modified() {
    let h = harness(5);
    seed_shifted(&h, "alice", "photo.png", b"re-encoded", 6).await;

    let verdict = h.verifier.verify("photo.png", b"re-encoded", "alice").await;

    assert_status(&verdict, VerdictStatus::ContentModified);
    assert_eq!(h.calls.count(), 0);
}

#[tokio::test]
async fn test_zero_tolerance_disables_fuzzy_matching() {
    let h = harness(0);
    seed_shifted(&h, "alice", "photo.png", b"re-encoded", 1).await;

    let verdict = h.verifier.verify("photo.png", b"re-encoded", "alice").await;

    assert_status(&verdict, VerdictStatus::ContentModified);
    assert_eq!(h.calls.count(), 0);
}

// =============================================================================
// Upload
// =============================================================================

#[tokio::test]
async fn test_upload_with_foreign_key_is_rejected() {
    let h = harness(5);
    provision(&h, "alice").await;
    let mallory_key = provision(&h, "mallory").await;

    let result = h
        .uploads
        .upload("alice", png("forged.png", b"forged"), &mallory_key)
        .await;

    assert!(matches!(result, Err(ImprintError::KeyMismatch(_))));
    assert!(h.blobs.is_empty());
    assert!(h.uploads.list("alice").await.unwrap().is_empty());
}

/// Record store whose inserts always fail
#[derive(Debug)]
struct RejectingRecords(MemoryStore);

#[async_trait]
impl RecordStore for RejectingRecords {
    async fn insert(&self, _: ImageRecord) -> Result<(), StorageError> {
        Err(StorageError::Database("disk full".into()))
    }
    async fn find_by_fingerprint(
        &self,
        fingerprint: &Fingerprint,
        owner: &str,
    ) -> Result<Option<ImageRecord>, StorageError> {
        self.0.find_by_fingerprint(fingerprint, owner).await
    }
    async fn find_by_name(&self, name: &str, owner: &str) -> Result<Option<ImageRecord>, StorageError> {
        self.0.find_by_name(name, owner).await
    }
    async fn get(&self, id: Uuid, owner: &str) -> Result<Option<ImageRecord>, StorageError> {
        RecordStore::get(&self.0, id, owner).await
    }
    async fn delete(&self, id: Uuid, owner: &str) -> Result<Option<ImageRecord>, StorageError> {
        RecordStore::delete(&self.0, id, owner).await
    }
    async fn list_by_owner(&self, owner: &str) -> Result<Vec<ImageRecord>, StorageError> {
        self.0.list_by_owner(owner).await
    }
}

#[tokio::test]
async fn test_failed_insert_rolls_back_blob() {
    let profiles = Arc::new(MemoryStore::new());
    let blobs = Arc::new(MemoryBlobStore::new());
    let keys = KeyManager::new(profiles);
    let private_key = keys
        .ensure_public_key("alice")
        .await
        .unwrap()
        .private_key
        .unwrap();
    let uploads = UploadService::new(
        Arc::new(RejectingRecords(MemoryStore::new())),
        blobs.clone(),
        keys,
    );

    let result = uploads.upload("alice", png("a.png", b"pixels"), &private_key).await;

    assert!(matches!(result, Err(ImprintError::Storage(_))));
    assert!(blobs.is_empty(), "blob must be removed when the record is not written");
}

#[tokio::test]
async fn test_deleted_image_no_longer_verifies() {
    let h = harness(5);
    let private_key = provision(&h, "alice").await;
    let record = h
        .uploads
        .upload("alice", png("holiday.png", b"original pixels"), &private_key)
        .await
        .unwrap();

    h.uploads.delete(record.id, "alice").await.unwrap();

    let verdict = h.verifier.verify("holiday.png", b"original pixels", "alice").await;
    assert_status(&verdict, VerdictStatus::NotFound);
    assert!(h.blobs.get(&record.storage_path).await.is_err());
}
