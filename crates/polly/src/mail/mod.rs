//! Outgoing mail: a storage-backed queue and its delivery backends.

mod error;
mod sender;
mod service;

pub use error::{MailError, Result};
pub use sender::{HttpMailSender, LogMailSender, MailSender};
pub use service::{DispatchReport, MailDispatchJob, MailService};
