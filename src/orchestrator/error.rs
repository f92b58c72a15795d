use crate::store::StoreError;
use thiserror::Error;

/// Failures reported synchronously to the caller of a control or retrieval command.
///
/// Per-file failures never show up here; they are data inside the finished artifact.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrchestratorError {
    #[error("Another operation is already in progress")]
    Busy,

    #[error("No operation is running")]
    NotRunning,

    #[error("Input artifact {0} not found")]
    InputNotFound(String),

    #[error("Cannot access {0}")]
    RootAccessFailure(String),

    #[error("Artifact {0} not found")]
    NotFound(String),

    #[error("Failed to persist artifact: {0}")]
    Persistence(String),
}

impl From<StoreError> for OrchestratorError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(name) | StoreError::InvalidName(name) => {
                OrchestratorError::NotFound(name)
            }
            other => OrchestratorError::Persistence(other.to_string()),
        }
    }
}
