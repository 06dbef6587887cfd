//! Checkpoint error types.

use crate::validation::ValidationErrors;
use thiserror::Error;

/// Errors that can occur while capturing or resuming from a checkpoint.
#[derive(Debug, Clone, Error)]
pub enum CheckpointError {
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),

    #[error("Unsupported checkpoint version {found}, supported: {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },

    /// The carried state does not fit the running tier table.
    #[error("Checkpoint validation failed: {0}")]
    ValidationFailed(String),

    #[error("Checkpoint carries invalid customer state: {0}")]
    InvalidState(ValidationErrors),
}
