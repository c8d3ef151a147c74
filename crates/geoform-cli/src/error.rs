use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] geoform_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Project not found for id/prefix: {0}")]
    ProjectNotFound(String),
    #[error("{0}")]
    AmbiguousProjectId(String),
    #[error("Record not found: {0}")]
    RecordNotFound(String),
    #[error("Invalid field data: {0}")]
    InvalidFieldData(String),
    #[error("Invalid coordinates: {0}")]
    InvalidCoordinates(String),
    #[error(
        "Sync is not configured. Set GEOFORM_API_BASE_URL to the survey server's base URL to enable `geoform submit`."
    )]
    SyncNotConfigured,
}
