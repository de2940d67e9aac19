//! Polly: a catalog backend built around one generic storage table.
//!
//! Typed payloads live as JSON documents keyed by a storage type tag. On top
//! of that sit a mail queue, a search index sync and a scheduler whose jobs
//! can be gated on leader election.

pub mod api;
pub mod build_info;
pub mod config;
pub mod handlers;
pub mod leader;
pub mod mail;
pub mod scheduler;
pub mod search;
pub mod server;
pub mod storage;
pub mod store;
pub mod validation;
