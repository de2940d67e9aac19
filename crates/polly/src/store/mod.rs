//! Persistence layer.
//!
//! Traits describe what the domain needs; `sql` holds the SQLite-backed
//! implementations.

mod error;
mod generic;
pub mod sql;

pub use error::{StorageError, StorageResult};
pub use generic::{GenericStore, StoredRow};
