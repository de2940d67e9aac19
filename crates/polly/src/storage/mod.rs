//! Generic typed storage.
//!
//! Domain objects are stored as JSON documents in one table, keyed by a type
//! tag. [`StorageService`] gives typed access on top of a
//! [`GenericStore`](crate::store::GenericStore).

mod record;
mod service;
mod types;

pub use record::{Actor, AuditMetadata, StorageRecord};
pub use service::{ScannedRecord, StorageService, UndecodableRecord};
pub use types::{
    AppState, IndexDocument, IndexStatus, MailTask, Payload, Settings, SingletonData,
    StorageData, StorageType,
};
