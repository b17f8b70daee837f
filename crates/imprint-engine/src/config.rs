//! Engine configuration loaded from `IMPRINT_*` environment variables
//!
//! Every setting has a default, so the server starts with no configuration
//! using in-memory stores.

use std::path::PathBuf;
use tracing::{warn, Level};

use imprint_core::DEFAULT_TOLERANCE;

use crate::core::DEFAULT_MAX_UPLOAD_BYTES;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Env: `IMPRINT_PORT`, default `8080`
    pub port: u16,

    /// Env: `IMPRINT_LOG_LEVEL`, default `info`
    pub log_level: Level,

    /// Fingerprint positions that may differ on a name match before the
    /// content counts as modified. `0` disables fuzzy matching. Raising it
    /// widens what a valid signature can vouch for.
    /// Env: `IMPRINT_FINGERPRINT_TOLERANCE`, default `5`
    pub fingerprint_tolerance: usize,

    /// Env: `IMPRINT_MAX_UPLOAD_BYTES`, default 20 MiB
    pub max_upload_bytes: usize,

    /// Directory for uploaded bytes; unset keeps them in memory.
    /// Env: `IMPRINT_BLOB_PATH`
    pub blob_path: Option<PathBuf>,

    /// PostgreSQL connection string; unset keeps records in memory.
    /// Only honoured with the `postgres` feature.
    /// Env: `IMPRINT_DATABASE_URL`
    pub database_url: Option<String>,

    /// Request header carrying the authenticated user id.
    /// Env: `IMPRINT_USER_HEADER`, default `x-user-id`
    pub user_header: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            log_level: Level::INFO,
            fingerprint_tolerance: DEFAULT_TOLERANCE,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            blob_path: None,
            database_url: None,
            user_header: "x-user-id".to_string(),
        }
    }
}

impl EngineConfig {
    /// Load from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from any variable source; invalid values fall back to defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(value) = lookup("IMPRINT_PORT") {
            config.port = parse_or_default("IMPRINT_PORT", &value, config.port);
        }

        if let Some(value) = lookup("IMPRINT_LOG_LEVEL") {
            config.log_level = parse_or_default("IMPRINT_LOG_LEVEL", &value, config.log_level);
        }

        if let Some(value) = lookup("IMPRINT_FINGERPRINT_TOLERANCE") {
            config.fingerprint_tolerance = parse_or_default(
                "IMPRINT_FINGERPRINT_TOLERANCE",
                &value,
                config.fingerprint_tolerance,
            );
        }

        if let Some(value) = lookup("IMPRINT_MAX_UPLOAD_BYTES") {
            config.max_upload_bytes =
                parse_or_default("IMPRINT_MAX_UPLOAD_BYTES", &value, config.max_upload_bytes);
        }

        config.blob_path = lookup("IMPRINT_BLOB_PATH")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        config.database_url = lookup("IMPRINT_DATABASE_URL").filter(|v| !v.trim().is_empty());

        if let Some(value) = lookup("IMPRINT_USER_HEADER") {
            if !value.trim().is_empty() {
                config.user_header = value.trim().to_ascii_lowercase();
            }
        }

        config
    }
}

fn parse_or_default<T: std::str::FromStr + Copy>(name: &str, value: &str, default: T) -> T {
    match value.trim().parse() {
        Ok(parsed) => parsed,
        Err(_) => {
            warn!(variable = name, value = %value, "Invalid value, using default");
            default
        }
    }
}
