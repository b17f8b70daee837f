//! Key lifecycle management for image owners

mod manager;

pub use manager::{EnsureOutcome, GeneratedKey, KeyManager};
