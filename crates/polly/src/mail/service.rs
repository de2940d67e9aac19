//! Mail queue backed by generic storage.
//!
//! `enqueue` stores one `MAIL_TASK` record per mail. The dispatch job drains
//! the queue: each record is deleted once its delivery attempt finishes,
//! whether or not the attempt succeeded. Delivery is therefore at-most-once.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};
use uuid::Uuid;

use super::error::{MailError, Result};
use super::sender::MailSender;
use crate::scheduler::{self, Job};
use crate::storage::{Actor, MailTask, StorageRecord, StorageService};
use crate::validation::{ValidationErrors, is_plausible_email};

/// Outcome of one dispatch pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub sent: usize,
    pub failed: usize,
}

/// Queues and dispatches mail.
#[derive(Clone)]
pub struct MailService {
    storage: StorageService,
    sender: Arc<dyn MailSender>,
}

impl MailService {
    pub fn new(storage: StorageService, sender: Arc<dyn MailSender>) -> Self {
        Self { storage, sender }
    }

    /// Validate and queue a mail.
    pub async fn enqueue(&self, actor: &Actor, task: MailTask) -> Result<StorageRecord> {
        let task = MailTask {
            to: task.to.trim().to_string(),
            subject: task.subject.trim().to_string(),
            body: task.body,
        };
        validate(&task).map_err(MailError::Invalid)?;

        let record = self.storage.save(actor, task).await?;
        info!(mail_id = %record.id(), actor = %actor, "Mail queued");
        Ok(record)
    }

    /// Mail tasks waiting for the next dispatch, oldest first.
    pub async fn queued(&self) -> Result<Vec<StorageRecord>> {
        Ok(self.storage.get_all::<MailTask>().await?)
    }

    /// Attempt delivery of every queued mail and remove each from the queue.
    ///
    /// A task whose stored payload does not decode counts as failed and is
    /// dropped without a delivery attempt.
    pub async fn dispatch_queued(&self) -> Result<DispatchReport> {
        let queued = self.storage.scan_all::<MailTask>().await?;
        let mut report = DispatchReport::default();

        for entry in queued {
            let record = match entry {
                Ok(record) => record,
                Err(bad) => {
                    report.failed += 1;
                    error!(mail_id = %bad.id, error = %bad.error, "Undecodable mail task dropped");
                    self.remove(bad.id).await?;
                    continue;
                }
            };

            let task: MailTask = record.data()?;
            match self.sender.send(&task).await {
                Ok(()) => report.sent += 1,
                Err(e) => {
                    report.failed += 1;
                    error!(
                        mail_id = %record.id(),
                        error = %e,
                        "Mail delivery failed, task dropped"
                    );
                }
            }
            self.remove(record.id()).await?;
        }

        Ok(report)
    }

    async fn remove(&self, id: Uuid) -> Result<()> {
        match self.storage.delete(id).await {
            Ok(()) => Ok(()),
            // Already removed by another dispatcher.
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn validate(task: &MailTask) -> std::result::Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    if task.to.is_empty() {
        errors.add("to", "is required");
    } else {
        errors.check(is_plausible_email(&task.to), "to", "is not an email address");
    }
    errors.check(!task.subject.is_empty(), "subject", "is required");
    errors.into_result()
}

/// Periodic job draining the mail queue.
pub struct MailDispatchJob {
    mail: MailService,
}

impl MailDispatchJob {
    pub fn new(mail: MailService) -> Self {
        Self { mail }
    }
}

#[async_trait]
impl Job for MailDispatchJob {
    fn name(&self) -> &'static str {
        "mail-dispatch"
    }

    async fn run(&self) -> scheduler::Result<()> {
        let report = self.mail.dispatch_queued().await?;
        if report.sent + report.failed > 0 {
            info!(sent = report.sent, failed = report.failed, "Mail dispatch finished");
        }
        Ok(())
    }
}
