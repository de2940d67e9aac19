//! Mail error types.

use thiserror::Error;

use crate::store::StorageError;
use crate::validation::ValidationErrors;

/// Errors from queueing or delivering mail.
#[derive(Debug, Error)]
pub enum MailError {
    /// The mail task failed validation.
    #[error("invalid mail task: {0}")]
    Invalid(ValidationErrors),

    /// HTTP request to the mail gateway failed.
    #[error("mail gateway request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Mail gateway rejected the mail.
    #[error("mail gateway returned {status}: {message}")]
    Rejected { status: u16, message: String },

    /// Queue storage failed.
    #[error("mail queue storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type for mail operations.
pub type Result<T> = std::result::Result<T, MailError>;
