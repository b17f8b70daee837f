//! Error types for the Imprint provenance engine

use thiserror::Error;

/// Result type alias using ImprintError
pub type Result<T> = std::result::Result<T, ImprintError>;

/// Errors that can occur while fingerprinting, signing or verifying images
#[derive(Error, Debug)]
pub enum ImprintError {
    /// Candidate bytes could not be read
    #[error("I/O failure: {0}")]
    Io(String),

    /// The key-profile store could not be reached or rejected the operation
    #[error("Key store failure: {0}")]
    KeyStore(String),

    /// The record or blob store could not be reached or rejected the operation
    #[error("Storage failure: {0}")]
    Storage(String),

    /// Key material failed to decode or import
    #[error("Malformed key: {0}")]
    MalformedKey(String),

    /// Signature material failed to decode
    #[error("Malformed signature: {0}")]
    MalformedSignature(String),

    /// No provisioned public key exists for the user
    #[error("No public key provisioned for user '{0}'")]
    KeyNotFound(String),

    /// The supplied private key does not belong to the user's provisioned public key
    #[error("Private key does not match the public key provisioned for user '{0}'")]
    KeyMismatch(String),

    /// Key generation or signing failed inside the RSA primitive
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// Caller supplied an unusable value
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl ImprintError {
    /// Whether this error describes damaged key or signature material rather
    /// than an infrastructure fault
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            ImprintError::MalformedKey(_) | ImprintError::MalformedSignature(_)
        )
    }
}

impl From<std::io::Error> for ImprintError {
    fn from(err: std::io::Error) -> Self {
        ImprintError::Io(err.to_string())
    }
}

impl From<rsa::Error> for ImprintError {
    fn from(err: rsa::Error) -> Self {
        ImprintError::Crypto(err.to_string())
    }
}
