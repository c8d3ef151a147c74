//! Error types for geoform-core

use thiserror::Error;

/// Result type alias using geoform-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in geoform-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Binary payload encoding error
    #[error("Encoding error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// Transport-level network failure
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Remote API rejected the request
    #[error("Sync API error: {0}")]
    Api(String),

    /// Stale or missing project version token; the project must be
    /// synced before data can be submitted
    #[error("Version conflict: {0}")]
    VersionConflict(String),

    /// Row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// File-system permission denied for backup destination
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
}

impl Error {
    /// The fail-fast condition for sync drains on a project that was
    /// never pushed to the server.
    pub fn need_to_sync() -> Self {
        Self::VersionConflict("need to sync".to_string())
    }
}
