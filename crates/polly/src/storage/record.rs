//! Generic storage records and their audit trail.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::types::{Payload, StorageData, StorageType};
use crate::store::{StorageError, StorageResult};

/// Identity of whoever performs a write.
///
/// Passed explicitly to every write so audit columns never depend on
/// ambient request state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor(String);

impl Actor {
    pub const SYSTEM: &'static str = "system";
    pub const ANONYMOUS: &'static str = "anonymous";

    pub fn new(ident: impl Into<String>) -> Self {
        Self(ident.into())
    }

    /// Actor used by scheduled jobs and startup code.
    pub fn system() -> Self {
        Self(Self::SYSTEM.to_string())
    }

    pub fn anonymous() -> Self {
        Self(Self::ANONYMOUS.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Audit columns, stamped by the store on every save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditMetadata {
    pub created_by: String,
    pub created_date: DateTime<Utc>,
    pub last_modified_by: String,
    pub last_modified_date: DateTime<Utc>,
}

/// A decoded row of generic storage.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageRecord {
    id: Uuid,
    payload: Payload,
    audit: Option<AuditMetadata>,
}

impl StorageRecord {
    /// Create a record with a fresh identity. Audit metadata is filled in on save.
    pub fn new(payload: Payload) -> Self {
        Self {
            id: Uuid::new_v4(),
            payload,
            audit: None,
        }
    }

    pub(crate) fn from_parts(id: Uuid, payload: Payload, audit: AuditMetadata) -> Self {
        Self {
            id,
            payload,
            audit: Some(audit),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn storage_type(&self) -> StorageType {
        self.payload.storage_type()
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// `None` until the record has been persisted.
    pub fn audit(&self) -> Option<&AuditMetadata> {
        self.audit.as_ref()
    }

    /// Typed view of the payload.
    pub fn data<T: StorageData>(&self) -> StorageResult<T> {
        T::from_payload(self.payload.clone()).ok_or_else(|| self.type_mismatch::<T>())
    }

    /// Replace the whole payload, keeping identity and audit trail.
    ///
    /// Saving a persisted record under another type fails with
    /// [`StorageError::TypeConflict`].
    pub fn set_data<T: StorageData>(&mut self, data: T) {
        self.payload = data.into_payload();
    }

    fn type_mismatch<T: StorageData>(&self) -> StorageError {
        StorageError::invalid_payload(
            T::TYPE,
            self.id,
            format!("record holds {} payload", self.storage_type()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MailTask, Settings};

    fn mail() -> MailTask {
        MailTask {
            to: "someone@example.org".into(),
            subject: "hello".into(),
            body: "world".into(),
        }
    }

    #[test]
    fn new_record_has_identity_but_no_audit() {
        let a = StorageRecord::new(mail().into_payload());
        let b = StorageRecord::new(mail().into_payload());
        assert_ne!(a.id(), b.id());
        assert!(a.audit().is_none());
        assert_eq!(a.storage_type(), StorageType::MailTask);
    }

    #[test]
    fn data_rejects_other_types() {
        let record = StorageRecord::new(mail().into_payload());
        assert_eq!(record.data::<MailTask>().unwrap(), mail());
        let err = record.data::<Settings>().unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn set_data_keeps_identity() {
        let mut record = StorageRecord::new(Settings::default().into_payload());
        let id = record.id();
        record.set_data(Settings {
            default_process_document: Some(Uuid::new_v4()),
        });
        assert_eq!(record.id(), id);
        assert!(
            record
                .data::<Settings>()
                .unwrap()
                .default_process_document
                .is_some()
        );
    }

    #[test]
    fn actor_display() {
        assert_eq!(Actor::system().to_string(), "system");
        assert_eq!(Actor::new("Z123456").as_str(), "Z123456");
    }
}
