//! Search index integration: document tracking, the index client and the
//! jobs that reconcile the two.

mod documents;
mod error;
mod index;
mod jobs;

pub use documents::IndexDocuments;
pub use error::{Result, SearchError};
pub use index::{HttpSearchIndex, SearchIndex};
pub use jobs::{IndexSyncJob, StalePurgeJob, SyncReport, purge_indexed_before, sync_documents};
