//! Verification verdicts
//!
//! A verdict is created fresh for each verification call and never persisted.
//! Every terminal state of the decision procedure is a verdict; only
//! infrastructure faults become [`VerdictStatus::Error`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::fingerprint::Fingerprint;
use crate::types::ImageRecord;

/// Classified outcome of a verification attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictStatus {
    Verified,
    ContentModified,
    SignatureInvalid,
    KeyUnavailable,
    NotFound,
    Error,
}

impl VerdictStatus {
    pub fn is_verified(&self) -> bool {
        matches!(self, VerdictStatus::Verified)
    }
}

/// How the candidate reached its record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchKind {
    /// Exact fingerprint lookup hit
    Fingerprint,
    /// Name lookup hit and the stored fingerprint matched exactly
    NameExact,
    /// Name lookup hit and the stored fingerprint was within tolerance
    NameTolerated { distance: usize },
}

/// Result of one verification call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub status: VerdictStatus,
    /// Human-readable explanation, safe to show to the caller
    pub detail: String,
    /// Fingerprint of the submitted bytes, when it was computed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<Fingerprint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched: Option<MatchKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<DateTime<Utc>>,
}

impl Verdict {
    fn bare(status: VerdictStatus, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
            fingerprint: None,
            matched: None,
            image_id: None,
            file_name: None,
            owner_user_id: None,
            uploaded_at: None,
        }
    }

    fn for_record(
        status: VerdictStatus,
        detail: impl Into<String>,
        fingerprint: &Fingerprint,
        record: &ImageRecord,
        matched: Option<MatchKind>,
    ) -> Self {
        Self {
            status,
            detail: detail.into(),
            fingerprint: Some(fingerprint.clone()),
            matched,
            image_id: Some(record.id),
            file_name: Some(record.file_name.clone()),
            owner_user_id: Some(record.owner_user_id.clone()),
            uploaded_at: Some(record.created_at),
        }
    }

    pub fn verified(fingerprint: &Fingerprint, record: &ImageRecord, matched: MatchKind) -> Self {
        let detail = match matched {
            MatchKind::NameTolerated { distance } => format!(
                "Signature verified despite a minor fingerprint difference ({} positions)",
                distance
            ),
            _ => "Image is authentic and unchanged since upload".to_string(),
        };
        Self::for_record(VerdictStatus::Verified, detail, fingerprint, record, Some(matched))
    }

    pub fn content_modified(fingerprint: &Fingerprint, record: &ImageRecord, distance: usize) -> Self {
        // Reached by name, but the content matched neither exactly nor within tolerance
        Self::for_record(
            VerdictStatus::ContentModified,
            format!(
                "Content differs from the uploaded '{}' ({} fingerprint positions changed)",
                record.file_name, distance
            ),
            fingerprint,
            record,
            None,
        )
    }

    pub fn signature_invalid(
        fingerprint: &Fingerprint,
        record: &ImageRecord,
        matched: MatchKind,
        detail: impl Into<String>,
    ) -> Self {
        Self::for_record(VerdictStatus::SignatureInvalid, detail, fingerprint, record, Some(matched))
    }

    pub fn key_unavailable(
        fingerprint: &Fingerprint,
        record: &ImageRecord,
        matched: MatchKind,
        detail: impl Into<String>,
    ) -> Self {
        Self::for_record(VerdictStatus::KeyUnavailable, detail, fingerprint, record, Some(matched))
    }

    pub fn not_found(fingerprint: &Fingerprint) -> Self {
        let mut verdict = Self::bare(
            VerdictStatus::NotFound,
            "No uploaded image matches this file's content or name",
        );
        verdict.fingerprint = Some(fingerprint.clone());
        verdict
    }

    /// Generic failure; `reference` correlates with the internal log entry
    pub fn error(reference: Uuid) -> Self {
        Self::bare(
            VerdictStatus::Error,
            format!(
                "Verification could not be completed; retry the request (reference {})",
                reference
            ),
        )
    }

    pub fn is_verified(&self) -> bool {
        self.status.is_verified()
    }
}
