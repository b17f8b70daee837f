//! Content fingerprinting
//!
//! A fingerprint is the SHA-256 digest of a file's raw bytes, rendered as 64
//! lowercase hex characters. Only the bytes are hashed; file name, mime type
//! and timestamps never contribute.
//!
//! This module also owns the positional comparison used by the name-fallback
//! path of verification, where a stored fingerprint and a freshly computed one
//! may differ in a handful of characters and still be considered "close".

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::Read;

use crate::error::{ImprintError, Result};

/// Length of a rendered fingerprint in characters
pub const FINGERPRINT_LEN: usize = 64;

/// Default number of differing positions tolerated on the name-fallback path
pub const DEFAULT_TOLERANCE: usize = 5;

const READ_CHUNK: usize = 64 * 1024;

/// Fixed-length content digest of a byte blob
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint an in-memory byte slice
    pub fn of(bytes: &[u8]) -> Self {
        Self(hex::encode(Sha256::digest(bytes)))
    }

    /// Fingerprint everything a reader yields
    ///
    /// Fails with [`ImprintError::Io`] only if the reader fails.
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; READ_CHUNK];
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(Self(hex::encode(hasher.finalize())))
    }

    /// Wrap a stored fingerprint string without validating it
    ///
    /// Stored values are compared positionally, so a damaged or legacy value
    /// must still be representable.
    pub fn from_stored(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Parse a fingerprint supplied by a caller, requiring the canonical form
    pub fn parse(value: &str) -> Result<Self> {
        let canonical = value.len() == FINGERPRINT_LEN
            && value.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        if !canonical {
            return Err(ImprintError::InvalidInput(format!(
                "fingerprint must be {} lowercase hex characters",
                FINGERPRINT_LEN
            )));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Bytes fed to the signer and verifier
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Bounded edit distance to another fingerprint
    ///
    /// Counts differing characters at each shared position and adds the
    /// difference in length. Never exceeds the longer of the two lengths.
    pub fn distance(&self, other: &Fingerprint) -> usize {
        let a = self.0.as_bytes();
        let b = other.0.as_bytes();
        let positional = a.iter().zip(b.iter()).filter(|(x, y)| x != y).count();
        positional + a.len().abs_diff(b.len())
    }

    /// Compare against a stored fingerprint under the given tolerance
    pub fn compare(&self, stored: &Fingerprint, tolerance: usize) -> Comparison {
        if self == stored {
            return Comparison::Exact;
        }
        let distance = self.distance(stored);
        if distance <= tolerance {
            Comparison::WithinTolerance { distance }
        } else {
            Comparison::Divergent { distance }
        }
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of comparing a fresh fingerprint with a stored one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// Identical digests
    Exact,
    /// Different, but within the tolerance; signature check still runs
    WithinTolerance { distance: usize },
    /// Too different; treated as modified content
    Divergent { distance: usize },
}

impl Comparison {
    /// Whether the signature check should run for this comparison
    pub fn proceeds_to_signature_check(&self) -> bool {
        !matches!(self, Comparison::Divergent { .. })
    }
}

/// Fingerprint a byte slice
pub fn fingerprint(bytes: &[u8]) -> Fingerprint {
    Fingerprint::of(bytes)
}
