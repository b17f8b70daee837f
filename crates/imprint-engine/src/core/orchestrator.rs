//! Verification entry point
//!
//! The orchestrator fingerprints the submitted bytes and hands them to the
//! [`ProvenanceMatcher`]. It always answers with a [`Verdict`]: anything the
//! matcher cannot classify becomes [`VerdictStatus::Error`] with an opaque
//! reference, and the underlying cause is logged under that reference.
//!
//! [`VerdictStatus::Error`]: imprint_core::VerdictStatus::Error

use std::path::Path;
use tracing::{error, info, instrument};
use uuid::Uuid;

use imprint_core::{Fingerprint, ImprintError, Verdict};

use super::matcher::{Candidate, ProvenanceMatcher};

/// Fail-closed wrapper around the matcher
#[derive(Debug, Clone)]
pub struct VerificationOrchestrator {
    matcher: ProvenanceMatcher,
}

impl VerificationOrchestrator {
    pub fn new(matcher: ProvenanceMatcher) -> Self {
        Self { matcher }
    }

    pub fn matcher(&self) -> &ProvenanceMatcher {
        &self.matcher
    }

    /// Verify in-memory content submitted under `file_name`
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn verify(&self, file_name: &str, bytes: &[u8], requesting_user: &str) -> Verdict {
        self.verify_candidate(&Candidate::new(file_name, bytes), requesting_user)
            .await
    }

    /// Verify an already fingerprinted candidate
    pub async fn verify_candidate(&self, candidate: &Candidate, requesting_user: &str) -> Verdict {
        match self.matcher.decide(candidate, requesting_user).await {
            Ok(verdict) => {
                info!(
                    user_id = %requesting_user,
                    file_name = %candidate.file_name,
                    status = ?verdict.status,
                    "Verification complete"
                );
                verdict
            }
            Err(e) => fail_closed(requesting_user, Some(&candidate.fingerprint), &e),
        }
    }

    /// Verify a file on disk, named by its final path component
    pub async fn verify_path(&self, path: impl AsRef<Path>, requesting_user: &str) -> Verdict {
        let path = path.as_ref();
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => return fail_closed(requesting_user, None, &ImprintError::from(e)),
        };
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.verify(&file_name, &bytes, requesting_user).await
    }
}

fn fail_closed(requesting_user: &str, fingerprint: Option<&Fingerprint>, cause: &ImprintError) -> Verdict {
    let reference = Uuid::new_v4();
    error!(
        reference = %reference,
        user_id = %requesting_user,
        fingerprint = ?fingerprint.map(Fingerprint::as_str),
        error = %cause,
        "Verification failed"
    );
    Verdict::error(reference)
}
