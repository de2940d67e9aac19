//! Storage type tags and the payload shapes they promise.
//!
//! Every row in generic storage carries a [`StorageType`] tag. The tag decides
//! which variant of [`Payload`] the JSON document decodes into; decoding is an
//! exhaustive match, so adding a type means adding a variant here.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// StorageType
// ============================================================================

/// Closed set of type tags stored in the `type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StorageType {
    Settings,
    AppState,
    MailTask,
    IndexDocument,
}

impl StorageType {
    pub const ALL: [StorageType; 4] = [
        StorageType::Settings,
        StorageType::AppState,
        StorageType::MailTask,
        StorageType::IndexDocument,
    ];

    /// Tag as written to the database.
    pub fn as_str(self) -> &'static str {
        match self {
            StorageType::Settings => "SETTINGS",
            StorageType::AppState => "APP_STATE",
            StorageType::MailTask => "MAIL_TASK",
            StorageType::IndexDocument => "INDEX_DOCUMENT",
        }
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StorageType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown storage type '{s}'"))
    }
}

// ============================================================================
// Payload
// ============================================================================

/// A decoded storage document, one variant per [`StorageType`].
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Settings(Settings),
    AppState(AppState),
    MailTask(MailTask),
    IndexDocument(IndexDocument),
}

impl Payload {
    pub fn storage_type(&self) -> StorageType {
        match self {
            Payload::Settings(_) => StorageType::Settings,
            Payload::AppState(_) => StorageType::AppState,
            Payload::MailTask(_) => StorageType::MailTask,
            Payload::IndexDocument(_) => StorageType::IndexDocument,
        }
    }

    /// Decode a stored JSON document according to its type tag.
    pub fn decode(
        storage_type: StorageType,
        data: serde_json::Value,
    ) -> Result<Self, serde_json::Error> {
        Ok(match storage_type {
            StorageType::Settings => Payload::Settings(serde_json::from_value(data)?),
            StorageType::AppState => Payload::AppState(serde_json::from_value(data)?),
            StorageType::MailTask => Payload::MailTask(serde_json::from_value(data)?),
            StorageType::IndexDocument => Payload::IndexDocument(serde_json::from_value(data)?),
        })
    }

    /// Encode the payload into the JSON document that goes into the `data` column.
    pub fn encode(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            Payload::Settings(v) => serde_json::to_value(v),
            Payload::AppState(v) => serde_json::to_value(v),
            Payload::MailTask(v) => serde_json::to_value(v),
            Payload::IndexDocument(v) => serde_json::to_value(v),
        }
    }
}

/// A typed payload that knows its own tag.
pub trait StorageData: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const TYPE: StorageType;

    fn into_payload(self) -> Payload;

    /// Extract `Self` from a payload, `None` if the variant differs.
    fn from_payload(payload: Payload) -> Option<Self>;
}

/// Marker for types stored as one record per tag.
pub trait SingletonData: StorageData + Default {}

macro_rules! storage_data {
    ($ty:ident) => {
        impl StorageData for $ty {
            const TYPE: StorageType = StorageType::$ty;

            fn into_payload(self) -> Payload {
                Payload::$ty(self)
            }

            fn from_payload(payload: Payload) -> Option<Self> {
                match payload {
                    Payload::$ty(v) => Some(v),
                    _ => None,
                }
            }
        }
    };
}

storage_data!(Settings);
storage_data!(AppState);
storage_data!(MailTask);
storage_data!(IndexDocument);

impl SingletonData for Settings {}
impl SingletonData for AppState {}

// ============================================================================
// Payload Shapes
// ============================================================================

/// Application-wide settings edited through the settings endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct Settings {
    /// Document linked to newly created processes.
    pub default_process_document: Option<Uuid>,
}

/// Internal bookkeeping for the scheduled jobs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct AppState {
    /// Advisory lock flag, see `StorageService::using_app_state`.
    pub locked: bool,
    pub last_index_sync: Option<DateTime<Utc>>,
    pub last_stale_purge: Option<DateTime<Utc>>,
}

/// A queued mail, one record per enqueue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MailTask {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// A document waiting to be pushed to, or removed from, the search index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct IndexDocument {
    pub index: String,
    pub document_id: String,
    pub document: serde_json::Value,
    #[serde(default)]
    pub status: IndexStatus,
    #[serde(default)]
    pub indexed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IndexStatus {
    #[default]
    Pending,
    Indexed,
    Deleted,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn storage_type_round_trips_through_tag() {
        for t in StorageType::ALL {
            assert_eq!(t.as_str().parse::<StorageType>().unwrap(), t);
            assert_eq!(
                serde_json::to_value(t).unwrap(),
                serde_json::Value::String(t.as_str().to_string())
            );
        }
    }

    #[test]
    fn storage_type_parse_is_case_insensitive() {
        assert_eq!(
            "mail_task".parse::<StorageType>().unwrap(),
            StorageType::MailTask
        );
        assert!("MAIL".parse::<StorageType>().is_err());
    }

    #[test]
    fn settings_with_null_document_decodes_to_default() {
        let payload = Payload::decode(
            StorageType::Settings,
            json!({"defaultProcessDocument": null}),
        )
        .unwrap();
        assert_eq!(payload, Payload::Settings(Settings::default()));
    }

    #[test]
    fn empty_document_decodes_singletons_to_default() {
        let payload = Payload::decode(StorageType::AppState, json!({})).unwrap();
        assert_eq!(payload, Payload::AppState(AppState::default()));
    }

    #[test]
    fn mismatched_shape_is_a_decode_error() {
        assert!(Payload::decode(StorageType::MailTask, json!({"locked": true})).is_err());
        assert!(Payload::decode(StorageType::Settings, json!({"unknown": 1})).is_err());
        assert!(
            Payload::decode(
                StorageType::Settings,
                json!({"defaultProcessDocument": "not-a-uuid"})
            )
            .is_err()
        );
    }

    #[test]
    fn payload_tag_follows_variant() {
        let mail = MailTask {
            to: "a@b.no".into(),
            subject: "s".into(),
            body: "b".into(),
        };
        let payload = mail.clone().into_payload();
        assert_eq!(payload.storage_type(), StorageType::MailTask);
        assert_eq!(MailTask::from_payload(payload.clone()), Some(mail));
        assert_eq!(Settings::from_payload(payload), None);
    }

    #[test]
    fn index_document_defaults_to_pending() {
        let payload = Payload::decode(
            StorageType::IndexDocument,
            json!({"index": "catalog", "documentId": "d1", "document": {"name": "x"}}),
        )
        .unwrap();
        match payload {
            Payload::IndexDocument(doc) => {
                assert_eq!(doc.status, IndexStatus::Pending);
                assert!(doc.indexed_at.is_none());
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn app_state_encodes_camel_case() {
        let value = Payload::AppState(AppState {
            locked: true,
            ..Default::default()
        })
        .encode()
        .unwrap();
        assert_eq!(value["locked"], json!(true));
        assert!(value.get("lastIndexSync").is_some());
    }
}
