//! Search index error types.

use thiserror::Error;

use crate::store::StorageError;
use crate::validation::ValidationErrors;

/// Errors raised while talking to the search index or tracking documents.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Document submission failed validation.
    #[error("invalid index document: {0}")]
    Invalid(ValidationErrors),

    /// The configured index URL cannot carry document paths.
    #[error("invalid search index url: {0}")]
    InvalidUrl(String),

    /// Transport failure or timeout.
    #[error("search index request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The index answered with a non-success status.
    #[error("search index rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// Backing storage failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, SearchError>;
