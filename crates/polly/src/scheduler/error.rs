//! Scheduler error types.

use thiserror::Error;

use crate::mail::MailError;
use crate::search::SearchError;
use crate::store::StorageError;

/// Errors that can occur while scheduling or running jobs.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Invalid job timing configuration.
    #[error("invalid job timing: {0}")]
    InvalidTiming(String),

    /// Storage error inside a job.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Mail delivery plumbing failed.
    #[error("mail error: {0}")]
    Mail(#[from] MailError),

    /// Search index integration failed.
    #[error("search index error: {0}")]
    Search(#[from] SearchError),
}

/// Result type for scheduler operations.
pub type Result<T> = std::result::Result<T, SchedulerError>;
