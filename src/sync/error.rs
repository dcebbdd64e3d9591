use thiserror::Error;

use crate::model::ParseError;

use super::diff::PatchError;
use super::persistence::PersistenceError;

/// Errors reported by the synchronization engine to the initiating caller.
///
/// None of these leave a model's committed state partially mutated.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The model is not open.
    #[error("model not found: {0}")]
    NotFound(String),

    /// The payload is not a well-formed model.
    #[error("invalid model: {0}")]
    InvalidModel(String),

    #[error("persistence failure: {0}")]
    PersistenceFailure(#[from] PersistenceError),

    #[error("patch failed: {0}")]
    Patch(#[from] PatchError),
}

pub type SyncResult<T> = Result<T, SyncError>;

impl From<ParseError> for SyncError {
    fn from(err: ParseError) -> Self {
        SyncError::InvalidModel(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::InvalidModel(err.to_string())
    }
}
