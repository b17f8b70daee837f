//! # Imprint Core
//!
//! Cryptographic primitives and data model for proving that an image under
//! inspection is the one a user uploaded, unchanged since upload.
//!
//! ## Key Concepts
//!
//! - **Fingerprint**: SHA-256 digest of a file's raw bytes, 64 hex characters
//! - **Key pair**: per-user RSA-2048 key; the private half lives only with the user
//! - **Signature**: RSA-PSS (SHA-256, 32-byte salt) over the fingerprint
//! - **Verdict**: classified outcome of one verification attempt
//!
//! ## Trust Model
//!
//! 1. **Ownership**: a user can only ever be matched against their own records
//! 2. **Freshness**: signatures are always checked against the freshly computed
//!    fingerprint, never the stored one
//! 3. **Tolerance**: on the name-fallback path, fingerprints within a small
//!    positional distance still proceed to the signature check, and the verdict
//!    says so

pub mod crypto;
pub mod error;
pub mod fingerprint;
pub mod types;
pub mod verdict;

pub use crypto::{KeyPair, PrivateKey, PublicKey};
pub use error::{ImprintError, Result};
pub use fingerprint::{fingerprint, Comparison, Fingerprint, DEFAULT_TOLERANCE};
pub use types::{ImageRecord, KeyStatus, NewImage, UserKeyRecord, PLACEHOLDER_PUBLIC_KEY};
pub use verdict::{MatchKind, Verdict, VerdictStatus};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get the library version
pub fn version() -> &'static str {
    VERSION
}
