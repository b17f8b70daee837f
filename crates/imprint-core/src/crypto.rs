//! RSA-PSS key pairs, signing and verification
//!
//! Keys are generated with fixed parameters: a 2048-bit modulus and public
//! exponent 65537, drawn from the operating system CSPRNG. Signatures use
//! PSS padding with SHA-256 and a fixed 32-byte salt, computed over the
//! fingerprint's textual bytes (never over the raw file).
//!
//! At rest and on the wire all key and signature material is standard base64:
//! - public keys: base64 of the SubjectPublicKeyInfo DER
//! - private keys: base64 of the PKCS#8 DER
//! - signatures: base64 of the raw signature bytes
//!
//! PSS is probabilistic, so signing the same fingerprint twice with the same
//! key yields different signature bytes. Both verify.

use base64::{engine::general_purpose::STANDARD, Engine};
use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::pss::{Signature, SigningKey, VerifyingKey};
use rsa::signature::{RandomizedSigner, SignatureEncoding, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;

use crate::error::{ImprintError, Result};
use crate::fingerprint::Fingerprint;

/// Modulus size of every generated key
pub const RSA_KEY_BITS: usize = 2048;

/// PSS salt length in bytes, equal to the SHA-256 output size
pub const PSS_SALT_LEN: usize = 32;

/// An RSA key pair for one user
///
/// The private half exists only until it has been exported to its owner.
#[derive(Clone)]
pub struct KeyPair {
    private_key: PrivateKey,
    public_key: PublicKey,
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key)
            .field("private_key", &"[redacted]")
            .finish()
    }
}

impl KeyPair {
    /// Generate a fresh key pair
    ///
    /// CPU-bound; async callers should run it on a blocking thread.
    pub fn generate() -> Result<Self> {
        let inner = RsaPrivateKey::new(&mut OsRng, RSA_KEY_BITS)?;
        Ok(PrivateKey { inner }.into_key_pair())
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn private_key(&self) -> &PrivateKey {
        &self.private_key
    }

    /// Split into halves, consuming the pair
    pub fn into_parts(self) -> (PrivateKey, PublicKey) {
        (self.private_key, self.public_key)
    }

    /// Sign a fingerprint with the private half
    pub fn sign(&self, fingerprint: &Fingerprint) -> Result<String> {
        self.private_key.sign(fingerprint)
    }
}

/// Private signing key, held only by its owner
#[derive(Clone)]
pub struct PrivateKey {
    inner: RsaPrivateKey,
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PrivateKey([redacted])")
    }
}

impl PrivateKey {
    /// Import a private key from its base64 PKCS#8 export
    pub fn from_export(export: &str) -> Result<Self> {
        let der = STANDARD
            .decode(export.trim())
            .map_err(|e| ImprintError::MalformedKey(format!("invalid base64: {}", e)))?;
        let inner = RsaPrivateKey::from_pkcs8_der(&der)
            .map_err(|e| ImprintError::MalformedKey(format!("invalid PKCS#8 key: {}", e)))?;
        inner
            .validate()
            .map_err(|e| ImprintError::MalformedKey(format!("inconsistent RSA key: {}", e)))?;
        Ok(Self { inner })
    }

    /// Export as base64 PKCS#8 DER
    pub fn to_export(&self) -> Result<String> {
        let der = self
            .inner
            .to_pkcs8_der()
            .map_err(|e| ImprintError::Crypto(format!("failed to encode private key: {}", e)))?;
        Ok(STANDARD.encode(der.as_bytes()))
    }

    /// Derive the matching public key
    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            inner: RsaPublicKey::from(&self.inner),
        }
    }

    /// Sign a fingerprint, returning the base64 signature
    pub fn sign(&self, fingerprint: &Fingerprint) -> Result<String> {
        let signing_key = SigningKey::<Sha256>::new_with_salt_len(self.inner.clone(), PSS_SALT_LEN);
        let signature: Signature = signing_key
            .try_sign_with_rng(&mut OsRng, fingerprint.as_bytes())
            .map_err(|e| ImprintError::Crypto(format!("signing failed: {}", e)))?;
        Ok(STANDARD.encode(signature.to_bytes()))
    }

    fn into_key_pair(self) -> KeyPair {
        let public_key = self.public_key();
        KeyPair {
            private_key: self,
            public_key,
        }
    }
}

/// Public verification key
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey {
    inner: RsaPublicKey,
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use rsa::traits::PublicKeyParts;
        f.debug_struct("PublicKey")
            .field("bits", &(self.inner.size() * 8))
            .finish()
    }
}

impl PublicKey {
    /// Import a public key from its base64 SPKI export
    pub fn from_export(export: &str) -> Result<Self> {
        let der = STANDARD
            .decode(export.trim())
            .map_err(|e| ImprintError::MalformedKey(format!("invalid base64: {}", e)))?;
        let inner = RsaPublicKey::from_public_key_der(&der)
            .map_err(|e| ImprintError::MalformedKey(format!("invalid public key: {}", e)))?;
        Ok(Self { inner })
    }

    /// Export as base64 SPKI DER
    pub fn to_export(&self) -> Result<String> {
        let der = self
            .inner
            .to_public_key_der()
            .map_err(|e| ImprintError::Crypto(format!("failed to encode public key: {}", e)))?;
        Ok(STANDARD.encode(der.as_bytes()))
    }

    /// Verify a base64 signature over a fingerprint
    ///
    /// A signature that does not match is `Ok(false)`. Only a signature that
    /// cannot be decoded at all is an error.
    pub fn verify(&self, fingerprint: &Fingerprint, signature: &str) -> Result<bool> {
        let bytes = STANDARD
            .decode(signature.trim())
            .map_err(|e| ImprintError::MalformedSignature(format!("invalid base64: {}", e)))?;
        if bytes.is_empty() {
            return Err(ImprintError::MalformedSignature("empty signature".into()));
        }
        let signature = Signature::try_from(bytes.as_slice())
            .map_err(|e| ImprintError::MalformedSignature(e.to_string()))?;

        let verifying_key =
            VerifyingKey::<Sha256>::new_with_salt_len(self.inner.clone(), PSS_SALT_LEN);
        Ok(verifying_key.verify(fingerprint.as_bytes(), &signature).is_ok())
    }
}

/// Sign a fingerprint with a private key
pub fn sign(fingerprint: &Fingerprint, private_key: &PrivateKey) -> Result<String> {
    private_key.sign(fingerprint)
}

/// Verify a signature over a fingerprint with a public key
pub fn verify(fingerprint: &Fingerprint, signature: &str, public_key: &PublicKey) -> Result<bool> {
    public_key.verify(fingerprint, signature)
}
