//! Error types for the submission repository.

use thiserror::Error;

use crate::store::StoreError;

/// Errors that can occur during submission repository operations.
#[derive(Error, Debug)]
pub enum SubmissionError {
    /// Malformed create arguments, rejected before any write.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Submission not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
