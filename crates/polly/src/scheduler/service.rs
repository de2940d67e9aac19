//! Job scheduler for periodic background work.
//!
//! Each job gets its own tokio task: wait the initial delay, then tick at a
//! fixed period. A tick awaits the job before the next one is considered, so
//! runs of one job never overlap; a slow run delays later ticks instead of
//! bursting to catch up.

// The handle list lock is never held across an await.
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::error::{Result, SchedulerError};
use super::job::Job;

// ============================================================================
// Timing
// ============================================================================

/// When a job first runs and how often it repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobTiming {
    initial_delay: Duration,
    period: Duration,
}

impl JobTiming {
    pub fn new(initial_delay: Duration, period: Duration) -> Result<Self> {
        if period.is_zero() {
            return Err(SchedulerError::InvalidTiming(
                "period must be > 0".to_string(),
            ));
        }
        Ok(Self {
            initial_delay,
            period,
        })
    }

    pub fn from_secs(initial_delay_seconds: u64, period_seconds: u64) -> Result<Self> {
        Self::new(
            Duration::from_secs(initial_delay_seconds),
            Duration::from_secs(period_seconds),
        )
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

// ============================================================================
// JobScheduler
// ============================================================================

/// Registry of running job loops.
#[derive(Clone, Default)]
pub struct JobScheduler {
    cancel: CancellationToken,
    handles: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl JobScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the loop for `job`.
    pub fn spawn(&self, job: Arc<dyn Job>, timing: JobTiming) {
        info!(
            job = job.name(),
            initial_delay_secs = timing.initial_delay.as_secs(),
            period_secs = timing.period.as_secs(),
            "Scheduling job"
        );

        let cancel = self.cancel.child_token();
        let handle = tokio::spawn(run_loop(job, timing, cancel));

        let mut guard = self.handles.lock().expect("mutex poisoned");
        guard.retain(|h| !h.is_finished());
        guard.push(handle);
    }

    /// Number of job loops still running.
    pub fn job_count(&self) -> usize {
        let mut guard = self.handles.lock().expect("mutex poisoned");
        guard.retain(|h| !h.is_finished());
        guard.len()
    }

    /// Stop all loops and wait for them. A run in progress completes first.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let handles: Vec<_> = std::mem::take(&mut *self.handles.lock().expect("mutex poisoned"));

        let count = handles.len();
        if count == 0 {
            return;
        }

        info!(count, "Waiting for scheduled jobs to stop");
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Job loop panicked");
            }
        }
        info!("Scheduled jobs stopped");
    }
}

/// Run `job` once, logging the outcome. Returns whether it succeeded.
pub async fn run_once(job: &dyn Job) -> bool {
    let started = Instant::now();
    match job.run().await {
        Ok(()) => {
            debug!(
                job = job.name(),
                duration_ms = started.elapsed().as_millis() as u64,
                "Job run finished"
            );
            true
        }
        Err(e) => {
            error!(
                job = job.name(),
                duration_ms = started.elapsed().as_millis() as u64,
                error = %e,
                "Job run failed"
            );
            false
        }
    }
}

async fn run_loop(job: Arc<dyn Job>, timing: JobTiming, cancel: CancellationToken) {
    tokio::select! {
        _ = tokio::time::sleep(timing.initial_delay) => {}
        _ = cancel.cancelled() => return,
    }

    let mut ticker = tokio::time::interval(timing.period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = cancel.cancelled() => break,
        }
        run_once(job.as_ref()).await;
    }

    debug!(job = job.name(), "Job loop stopped");
}
