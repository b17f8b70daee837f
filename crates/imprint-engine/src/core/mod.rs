//! Verification and upload logic
//!
//! Everything here is request-scoped: the services hold only injected stores
//! and configuration, and every call reads fresh state from the stores.

mod matcher;
mod orchestrator;
mod upload;

pub use matcher::{Candidate, ProvenanceMatcher, RsaPssVerifier, SignatureVerifier};
pub use orchestrator::VerificationOrchestrator;
pub use upload::{UploadService, DEFAULT_MAX_UPLOAD_BYTES};
