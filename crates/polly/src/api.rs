//! Request and response types of the HTTP API.
//!
//! Field names are camelCase, matching the stored payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::storage::{StorageRecord, StorageType};

// ============================================================================
// Headers
// ============================================================================

/// Header carrying the caller's user ident. Audit columns are stamped with it.
pub const USER_IDENT_HEADER: &str = "x-user-ident";

// ============================================================================
// Records
// ============================================================================

/// A stored record as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordResponse {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub storage_type: StorageType,
    pub data: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified_date: Option<DateTime<Utc>>,
}

impl RecordResponse {
    pub fn from_record(record: &StorageRecord) -> Result<Self, serde_json::Error> {
        let audit = record.audit();
        Ok(Self {
            id: record.id(),
            storage_type: record.storage_type(),
            data: record.payload().encode()?,
            created_by: audit.map(|a| a.created_by.clone()),
            created_date: audit.map(|a| a.created_date),
            last_modified_by: audit.map(|a| a.last_modified_by.clone()),
            last_modified_date: audit.map(|a| a.last_modified_date),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListRecordsResponse {
    pub records: Vec<RecordResponse>,
}

// ============================================================================
// Mail
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EnqueueMailRequest {
    pub to: String,
    pub subject: String,
    #[serde(default)]
    pub body: String,
}

// ============================================================================
// Index documents
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SubmitIndexDocumentRequest {
    pub index: String,
    pub document_id: String,
    pub document: serde_json::Value,
}

// ============================================================================
// Admin
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockResponse {
    pub was_locked: bool,
}
