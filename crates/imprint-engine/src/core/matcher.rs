//! Provenance matching
//!
//! This module decides the verdict for one candidate file on behalf of one
//! requesting user. The steps run strictly in order and each outcome decides
//! whether the next runs:
//!
//! 1. FINGERPRINT LOOKUP: the user's record with this exact fingerprint
//! 2. NAME FALLBACK: otherwise, the user's record with this file name
//! 3. CONTENT COMPARISON: for name hits, exact or within tolerance continues;
//!    anything further is `ContentModified` and the verifier never runs
//! 4. SIGNATURE CHECK: the owner's public key against the stored signature,
//!    always over the freshly computed fingerprint
//!
//! Every lookup is scoped to the requesting user. A record owned by someone
//! else is never matched, even if a store were to return one.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use imprint_core::{
    crypto, Comparison, Fingerprint, ImageRecord, ImprintError, MatchKind, PublicKey, Result,
    Verdict,
};

use crate::keys::KeyManager;
use crate::storage::RecordStore;

/// Checks a signature over a fingerprint
///
/// A non-matching signature is `Ok(false)`; errors are reserved for material
/// that cannot be decoded.
pub trait SignatureVerifier: Send + Sync + std::fmt::Debug {
    fn verify(&self, fingerprint: &Fingerprint, signature: &str, key: &PublicKey) -> Result<bool>;
}

/// RSA-PSS/SHA-256 verifier
#[derive(Debug, Default, Clone, Copy)]
pub struct RsaPssVerifier;

impl SignatureVerifier for RsaPssVerifier {
    fn verify(&self, fingerprint: &Fingerprint, signature: &str, key: &PublicKey) -> Result<bool> {
        crypto::verify(fingerprint, signature, key)
    }
}

/// A file submitted for verification, already fingerprinted
#[derive(Debug, Clone)]
pub struct Candidate {
    pub file_name: String,
    pub fingerprint: Fingerprint,
}

impl Candidate {
    pub fn new(file_name: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            file_name: file_name.into(),
            fingerprint: Fingerprint::of(bytes),
        }
    }
}

/// Where the lookup steps ended
#[derive(Debug)]
enum Lookup {
    /// Continue to the signature check with this record
    Matched { record: ImageRecord, kind: MatchKind },
    /// Reached by name, but the content is too different
    Modified { record: ImageRecord, distance: usize },
    Missing,
}

/// Runs the four-step decision procedure
#[derive(Debug, Clone)]
pub struct ProvenanceMatcher {
    records: Arc<dyn RecordStore>,
    keys: KeyManager,
    verifier: Arc<dyn SignatureVerifier>,
    tolerance: usize,
}

impl ProvenanceMatcher {
    pub fn new(records: Arc<dyn RecordStore>, keys: KeyManager, tolerance: usize) -> Self {
        Self {
            records,
            keys,
            verifier: Arc::new(RsaPssVerifier),
            tolerance,
        }
    }

    /// Replace the signature verifier
    pub fn with_verifier(mut self, verifier: Arc<dyn SignatureVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn tolerance(&self) -> usize {
        self.tolerance
    }

    /// Decide the verdict for a candidate
    ///
    /// Returns `Err` only for infrastructure faults (record store, key store,
    /// broken ownership scoping); every other outcome is a verdict.
    pub async fn decide(&self, candidate: &Candidate, requesting_user: &str) -> Result<Verdict> {
        let fresh = &candidate.fingerprint;

        match self.lookup(candidate, requesting_user).await? {
            Lookup::Missing => {
                info!(
                    user_id = %requesting_user,
                    file_name = %candidate.file_name,
                    fingerprint = %fresh,
                    "No record reachable by fingerprint or name"
                );
                Ok(Verdict::not_found(fresh))
            }
            Lookup::Modified { record, distance } => {
                warn!(
                    user_id = %requesting_user,
                    image_id = %record.id,
                    distance,
                    tolerance = self.tolerance,
                    "Content modified since upload"
                );
                Ok(Verdict::content_modified(fresh, &record, distance))
            }
            Lookup::Matched { record, kind } => self.check_signature(fresh, &record, kind).await,
        }
    }

    /// Steps 1-3
    async fn lookup(&self, candidate: &Candidate, requesting_user: &str) -> Result<Lookup> {
        let fresh = &candidate.fingerprint;

        let by_fingerprint = self
            .records
            .find_by_fingerprint(fresh, requesting_user)
            .await
            .map_err(|e| e.into_storage())?;
        if let Some(record) = by_fingerprint {
            ensure_owned(&record, requesting_user)?;
            debug!(image_id = %record.id, "Fingerprint lookup hit");
            return Ok(Lookup::Matched {
                record,
                kind: MatchKind::Fingerprint,
            });
        }

        let by_name = self
            .records
            .find_by_name(&candidate.file_name, requesting_user)
            .await
            .map_err(|e| e.into_storage())?;
        let Some(record) = by_name else {
            return Ok(Lookup::Missing);
        };
        ensure_owned(&record, requesting_user)?;
        debug!(image_id = %record.id, "Name fallback lookup hit");

        let lookup = match fresh.compare(&record.content_fingerprint, self.tolerance) {
            Comparison::Exact => Lookup::Matched {
                record,
                kind: MatchKind::NameExact,
            },
            Comparison::WithinTolerance { distance } => {
                info!(
                    image_id = %record.id,
                    distance,
                    tolerance = self.tolerance,
                    "Fingerprint differs within tolerance; checking signature"
                );
                Lookup::Matched {
                    record,
                    kind: MatchKind::NameTolerated { distance },
                }
            }
            Comparison::Divergent { distance } => Lookup::Modified { record, distance },
        };
        Ok(lookup)
    }

    /// Step 4
    async fn check_signature(
        &self,
        fresh: &Fingerprint,
        record: &ImageRecord,
        kind: MatchKind,
    ) -> Result<Verdict> {
        let owner = &record.owner_user_id;

        let key = match self.keys.resolve_public_key(owner).await {
            Ok(key) => key,
            Err(ImprintError::KeyNotFound(_)) => {
                warn!(image_id = %record.id, owner = %owner, "Record found but owner has no public key");
                return Ok(Verdict::key_unavailable(
                    fresh,
                    record,
                    kind,
                    "The image was found, but its owner has no public key to verify it with",
                ));
            }
            Err(ImprintError::MalformedKey(reason)) => {
                warn!(image_id = %record.id, owner = %owner, reason = %reason, "Owner's stored public key is malformed");
                return Ok(Verdict::key_unavailable(
                    fresh,
                    record,
                    kind,
                    "The image was found, but its owner's stored public key is corrupt",
                ));
            }
            Err(e) => return Err(e),
        };

        match self.verifier.verify(fresh, &record.signature, &key) {
            Ok(true) => {
                info!(image_id = %record.id, owner = %owner, matched = ?kind, "Signature verified");
                Ok(Verdict::verified(fresh, record, kind))
            }
            Ok(false) => {
                warn!(image_id = %record.id, owner = %owner, "Signature does not match");
                Ok(Verdict::signature_invalid(
                    fresh,
                    record,
                    kind,
                    "The stored signature does not match this content under the owner's current key",
                ))
            }
            Err(ImprintError::MalformedSignature(reason)) => {
                warn!(image_id = %record.id, reason = %reason, "Stored signature is malformed");
                Ok(Verdict::signature_invalid(
                    fresh,
                    record,
                    kind,
                    "The stored signature is corrupt and cannot be checked",
                ))
            }
            Err(e) => Err(e),
        }
    }
}

/// Refuse a record a store returned for the wrong owner
fn ensure_owned(record: &ImageRecord, requesting_user: &str) -> Result<()> {
    if record.is_owned_by(requesting_user) {
        return Ok(());
    }
    error!(
        image_id = %record.id,
        requesting_user = %requesting_user,
        "SECURITY: record store returned a record outside the requesting user's scope"
    );
    Err(ImprintError::Storage(
        "record store violated ownership scoping".into(),
    ))
}
