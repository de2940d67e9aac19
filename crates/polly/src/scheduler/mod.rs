//! Periodic background jobs.
//!
//! A [`JobScheduler`] drives each registered [`Job`] on a fixed delay.
//! Jobs that must run on a single replica are wrapped in [`LeaderGated`].
//!
//! # Usage
//!
//! ```ignore
//! let scheduler = JobScheduler::new();
//! scheduler.spawn(Arc::new(MailDispatchJob::new(mail)), JobTiming::from_secs(60, 60)?);
//! scheduler.spawn(
//!     Arc::new(LeaderGated::new(IndexSyncJob::new(storage, index), gate)),
//!     JobTiming::from_secs(30, 300)?,
//! );
//!
//! // On shutdown
//! scheduler.shutdown().await;
//! ```

pub mod error;
pub mod job;
pub mod service;

pub use error::{Result, SchedulerError};
pub use job::{Job, LeaderGated};
pub use service::{JobScheduler, JobTiming, run_once};
