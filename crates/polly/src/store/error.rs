//! Unified error types for storage operations.

use thiserror::Error;
use uuid::Uuid;

use crate::storage::StorageType;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    // ========================================================================
    // SQL backend errors
    // ========================================================================
    /// Query or connection failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failed at startup.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A row carried a type tag this build does not know.
    #[error("unknown storage type '{tag}' on record {id}")]
    UnknownType { id: String, tag: String },

    // ========================================================================
    // Payload contract errors
    // ========================================================================
    /// Error serializing a payload.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Stored payload does not match the shape its type tag promises.
    #[error("invalid {storage_type} payload on record {id}: {message}")]
    InvalidPayload {
        storage_type: StorageType,
        id: Uuid,
        message: String,
    },

    /// A save tried to give an existing record another type tag.
    #[error("record {id} already exists with a type other than {storage_type}")]
    TypeConflict { id: Uuid, storage_type: StorageType },

    // ========================================================================
    // Generic errors (any backend)
    // ========================================================================
    /// Entity not found.
    #[error("{entity_type} not found: {id}")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },
}

impl StorageError {
    /// Create a serialization error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization(message.into())
    }

    /// Create a payload contract error for a stored record.
    pub fn invalid_payload(
        storage_type: StorageType,
        id: Uuid,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidPayload {
            storage_type,
            id,
            message: message.into(),
        }
    }

    /// Create a not found error.
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Whether the error belongs to the not-found class.
    ///
    /// A payload that violates its type contract is reported like a missing
    /// entity: the caller asked for a shape that does not exist under that id.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::InvalidPayload { .. })
    }
}

/// Convenience type alias for storage results.
pub type StorageResult<T> = Result<T, StorageError>;
