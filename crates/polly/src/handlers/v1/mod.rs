//! V1 API handlers.

mod index_documents;
mod mail;
mod settings;
mod storage;

pub use index_documents::{delete_index_document, get_index_document, submit_index_document};
pub use mail::{enqueue_mail, list_mail};
pub use settings::{get_settings, put_settings};
pub use storage::{get_record, list_records};

use crate::api::{ListRecordsResponse, RecordResponse};
use crate::handlers::ApiError;
use crate::storage::StorageRecord;

fn record_response(record: &StorageRecord) -> Result<RecordResponse, ApiError> {
    RecordResponse::from_record(record).map_err(|e| ApiError::Technical(e.to_string()))
}

fn list_response(records: &[StorageRecord]) -> Result<ListRecordsResponse, ApiError> {
    let records = records
        .iter()
        .map(record_response)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ListRecordsResponse { records })
}
