//! Error types for invsync-rules

use crate::condition::MatchError;

/// Result type for invsync-rules operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while evaluating rules
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A condition could not be evaluated
    #[error(transparent)]
    Match(#[from] MatchError),

    /// Every eligible folder pool is full
    #[error("No folder pool has a free seat for {key}")]
    AllocationExhausted { key: String },

    /// A folder pool action matched but no allocator was supplied
    #[error("Folder pool requested for {key} but no pool allocator is configured")]
    PoolsUnavailable { key: String },

    /// The seat allocator failed to persist or load pool state
    #[error("Folder pool allocator failed: {0}")]
    Allocator(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A rewrite pattern does not compile
    #[error("Invalid pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// An action parameter template does not render
    #[error("Invalid template {template:?}: {message}")]
    Template { template: String, message: String },

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// TOML deserialization error
    #[error(transparent)]
    TomlDe(#[from] toml::de::Error),
}

impl Error {
    /// Wrap an allocator-side error
    pub fn allocator(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Allocator(Box::new(source))
    }
}
