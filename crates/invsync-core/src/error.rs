//! Error types for invsync-core

use std::path::PathBuf;

/// Result type for invsync-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in invsync-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration file not found at expected path
    #[error("Configuration not found at {path}")]
    ConfigNotFound { path: PathBuf },

    /// Account name not present in the configuration
    #[error("Unknown account: {name}")]
    UnknownAccount { name: String },

    /// Secret environment variable is not set
    #[error("Secret for account {account} not found in ${var}")]
    MissingSecret { account: String, var: String },

    /// Record key cannot be used as a file name
    #[error("Invalid record key: {key:?}")]
    InvalidKey { key: String },

    /// Record not present in the store
    #[error("Record not found: {key}")]
    RecordNotFound { key: String },

    /// Remote API answered with a non-whitelisted error
    #[error("Remote system error {status} on {path}: {title}{}", detail_suffix(.detail))]
    RemoteSystem {
        status: u16,
        title: String,
        detail: String,
        path: String,
    },

    /// Remote answered with a body this client does not understand
    #[error("Unexpected remote response on {path}: {message}")]
    UnexpectedResponse { path: String, message: String },

    // Transparent wrappers for underlying crate errors
    /// Rule evaluation error from invsync-rules
    #[error(transparent)]
    Rules(#[from] invsync_rules::Error),

    /// HTTP transport error
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// Worker pool could not be started
    #[error(transparent)]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// TOML deserialization error
    #[error(transparent)]
    TomlDe(#[from] toml::de::Error),

    /// TOML serialization error
    #[error(transparent)]
    TomlSer(#[from] toml::ser::Error),
}

fn detail_suffix(detail: &str) -> String {
    if detail.is_empty() {
        String::new()
    } else {
        format!(" ({detail})")
    }
}
