//! Application configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (host:port)
    pub bind_address: String,

    /// Log level applied when RUST_LOG is unset
    pub log_level: String,

    /// Root directory holding one subdirectory per repository
    pub storage_path: PathBuf,

    /// Path to the persisted token store (JSON, rewritten wholesale on change)
    pub tokens_file: PathBuf,

    /// Path to the repository definitions file (JSON); optional, defaults apply
    pub repositories_file: PathBuf,

    /// Maximum accepted upload body in bytes
    pub max_upload_bytes: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            storage_path: env::var("STORAGE_PATH")
                .unwrap_or_else(|_| "/var/lib/stockpile/repositories".into())
                .into(),
            tokens_file: env::var("TOKENS_FILE")
                .unwrap_or_else(|_| "/var/lib/stockpile/tokens.json".into())
                .into(),
            repositories_file: env::var("REPOSITORIES_FILE")
                .unwrap_or_else(|_| "/var/lib/stockpile/repositories.json".into())
                .into(),
            max_upload_bytes: env::var("MAX_UPLOAD_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(512 * 1024 * 1024),
        }
    }
}
