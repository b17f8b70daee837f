//! Records persisted by the stores around the engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crypto::PublicKey;
use crate::fingerprint::Fingerprint;

/// Value written into a freshly created profile before any key exists
///
/// It is never interpreted; the `provisioned` flag on [`UserKeyRecord`] is
/// what marks a slot as unusable.
pub const PLACEHOLDER_PUBLIC_KEY: &str = "unprovisioned";

/// An uploaded, signed image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: Uuid,
    pub owner_user_id: String,
    pub file_name: String,
    pub file_size: u64,
    pub file_type: String,
    pub content_fingerprint: Fingerprint,
    /// Base64 RSA-PSS signature over `content_fingerprint`
    pub signature: String,
    /// Blob store path of the uploaded bytes
    pub storage_path: String,
    pub created_at: DateTime<Utc>,
}

impl ImageRecord {
    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.owner_user_id == user_id
    }
}

/// Image content supplied at upload time
#[derive(Debug, Clone)]
pub struct NewImage {
    pub file_name: String,
    pub file_type: String,
    pub bytes: Vec<u8>,
}

/// A user's public-key slot in the key-profile store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserKeyRecord {
    pub user_id: String,
    /// Base64 SPKI export, or [`PLACEHOLDER_PUBLIC_KEY`] while unprovisioned
    pub public_key: String,
    /// Whether `public_key` holds a real generated key
    pub provisioned: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserKeyRecord {
    /// Profile as seeded by account creation, before any key is generated
    pub fn placeholder(user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.into(),
            public_key: PLACEHOLDER_PUBLIC_KEY.to_string(),
            provisioned: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Profile holding a generated public key
    pub fn provisioned(user_id: impl Into<String>, public_key: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.into(),
            public_key: public_key.into(),
            provisioned: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Classify the slot
    pub fn status(&self) -> KeyStatus {
        if !self.provisioned {
            return KeyStatus::Unprovisioned;
        }
        match PublicKey::from_export(&self.public_key) {
            Ok(key) => KeyStatus::Provisioned(key),
            Err(e) => KeyStatus::Broken(e.to_string()),
        }
    }
}

/// State of a user's key slot
#[derive(Debug, Clone)]
pub enum KeyStatus {
    /// No record, or a record still holding the placeholder
    Unprovisioned,
    /// A usable public key
    Provisioned(PublicKey),
    /// Marked provisioned, but the stored value does not import
    Broken(String),
}

impl KeyStatus {
    /// Status of an optional stored record
    pub fn of(record: Option<&UserKeyRecord>) -> Self {
        record.map(UserKeyRecord::status).unwrap_or(KeyStatus::Unprovisioned)
    }

    pub fn label(&self) -> &'static str {
        match self {
            KeyStatus::Unprovisioned => "unprovisioned",
            KeyStatus::Provisioned(_) => "provisioned",
            KeyStatus::Broken(_) => "broken",
        }
    }
}
