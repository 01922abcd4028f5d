//! PrintJobQueue - durable, per-printer ordered print work
//!
//! Jobs live in storage from enqueue until the end of time; state moves
//! `queued → printing → completed | failed`, with automatic requeue while
//! attempts remain. Eligibility for dequeue honours a per-job `not_before`
//! gate, giving FIFO-with-skip ordering: a job under backoff never starves
//! the jobs queued behind it.

use parking_lot::Mutex;
use shared::util::new_id;
use shared::{PrintJob, PrintJobStatus, PrintType};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use super::{PrintingError, PrintingResult};
use crate::db::Storage;
use crate::utils::Clock;

/// Retry/backoff bounds for failed deliveries
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Delivery attempts before a job settles as failed
    pub max_attempts: u32,
    /// First backoff delay
    pub backoff_base_ms: i64,
    /// Backoff ceiling
    pub backoff_cap_ms: i64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: shared::DEFAULT_MAX_ATTEMPTS,
            backoff_base_ms: 2_000,
            backoff_cap_ms: 60_000,
        }
    }
}

impl RetryPolicy {
    /// Exponential backoff after `attempts` completed attempts: base,
    /// doubling, capped.
    pub fn backoff_ms(&self, attempts: u32) -> i64 {
        let exp = attempts.saturating_sub(1).min(16);
        (self.backoff_base_ms << exp).min(self.backoff_cap_ms)
    }
}

/// Print job queue
pub struct PrintJobQueue {
    storage: Storage,
    clock: Arc<dyn Clock>,
    policy: RetryPolicy,
    /// Serializes job state transitions so two workers can never claim the
    /// same job
    guard: Mutex<()>,
    /// Last issued creation timestamp; enqueues within the same millisecond
    /// still get strictly increasing timestamps, keeping dequeue FIFO
    last_created: AtomicI64,
}

impl PrintJobQueue {
    pub fn new(storage: Storage, clock: Arc<dyn Clock>, policy: RetryPolicy) -> Self {
        Self {
            storage,
            clock,
            policy,
            guard: Mutex::new(()),
            last_created: AtomicI64::new(0),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Create a job in `queued` state
    ///
    /// Fails when the order or printer is missing, or the printer is
    /// disabled.
    pub fn enqueue(
        &self,
        order_id: &str,
        printer_id: &str,
        print_type: PrintType,
    ) -> PrintingResult<PrintJob> {
        let order = self
            .storage
            .get_order(order_id)?
            .ok_or_else(|| PrintingError::OrderNotFound(order_id.to_string()))?;
        let printer = self
            .storage
            .get_printer(printer_id)?
            .ok_or_else(|| PrintingError::PrinterNotFound(printer_id.to_string()))?;
        if !printer.enabled {
            return Err(PrintingError::PrinterDisabled(printer_id.to_string()));
        }

        let job = PrintJob {
            id: new_id(),
            order_id: order.id,
            printer_id: printer.id,
            restaurant_id: printer.restaurant_id,
            print_type,
            status: PrintJobStatus::Queued,
            attempts: 0,
            max_attempts: self.policy.max_attempts,
            created_at: self.next_created_at(),
            completed_at: None,
            error: None,
            not_before: 0,
            started_at: None,
        };
        self.storage.store_job(&job)?;
        tracing::info!(
            job_id = %job.id,
            printer_id = %job.printer_id,
            order_id = %job.order_id,
            print_type = ?job.print_type,
            "Print job enqueued"
        );
        Ok(job)
    }

    /// Oldest eligible `queued` job for the printer, without claiming it
    ///
    /// The claim (`mark_printing`) is a separate, observable step.
    pub fn dequeue_next(&self, printer_id: &str) -> PrintingResult<Option<PrintJob>> {
        let now = self.clock.now_millis();
        Ok(self
            .storage
            .list_jobs_for_printer(printer_id)?
            .into_iter()
            .find(|j| j.is_eligible(now)))
    }

    /// Earliest future `not_before` among the printer's queued jobs
    ///
    /// `None` when no queued job is waiting on backoff; workers use this to
    /// size their sleep instead of polling.
    pub fn next_wake_at(&self, printer_id: &str) -> PrintingResult<Option<i64>> {
        let now = self.clock.now_millis();
        Ok(self
            .storage
            .list_jobs_for_printer(printer_id)?
            .into_iter()
            .filter(|j| j.status == PrintJobStatus::Queued && j.not_before > now)
            .map(|j| j.not_before)
            .min())
    }

    /// Claim a queued job for delivery
    pub fn mark_printing(&self, job_id: &str) -> PrintingResult<PrintJob> {
        let _guard = self.guard.lock();
        let mut job = self.load(job_id)?;
        if job.status != PrintJobStatus::Queued {
            return Err(PrintingError::InvalidState(format!(
                "cannot claim job {job_id} in {:?} state",
                job.status
            )));
        }
        job.status = PrintJobStatus::Printing;
        job.started_at = Some(self.clock.now_millis());
        self.storage.store_job(&job)?;
        Ok(job)
    }

    /// Record a successful delivery
    pub fn mark_completed(&self, job_id: &str) -> PrintingResult<PrintJob> {
        let _guard = self.guard.lock();
        let mut job = self.load(job_id)?;
        if job.status != PrintJobStatus::Printing {
            return Err(PrintingError::InvalidState(format!(
                "cannot complete job {job_id} in {:?} state",
                job.status
            )));
        }
        job.status = PrintJobStatus::Completed;
        job.completed_at = Some(self.clock.now_millis());
        job.error = None;
        self.storage.store_job(&job)?;
        Ok(job)
    }

    /// Record a failed delivery attempt
    ///
    /// While attempts remain the job goes back to `queued` behind an
    /// exponential backoff gate; only exhaustion settles it as `failed`.
    pub fn mark_failed(&self, job_id: &str, error: &str) -> PrintingResult<PrintJob> {
        let _guard = self.guard.lock();
        let mut job = self.load(job_id)?;
        if job.status != PrintJobStatus::Printing {
            return Err(PrintingError::InvalidState(format!(
                "cannot fail job {job_id} in {:?} state",
                job.status
            )));
        }
        self.apply_failure(&mut job, error)?;
        Ok(job)
    }

    /// Manual requeue of a failed job
    ///
    /// Attempts are preserved so the retry history stays visible; the next
    /// failure settles the job again.
    pub fn retry(&self, job_id: &str) -> PrintingResult<PrintJob> {
        let _guard = self.guard.lock();
        let mut job = self.load(job_id)?;
        if job.status != PrintJobStatus::Failed {
            return Err(PrintingError::InvalidState(format!(
                "cannot retry job {job_id} in {:?} state",
                job.status
            )));
        }
        job.status = PrintJobStatus::Queued;
        job.error = None;
        job.not_before = 0;
        job.started_at = None;
        self.storage.store_job(&job)?;
        tracing::info!(job_id = %job.id, attempts = job.attempts, "Print job requeued manually");
        Ok(job)
    }

    /// Cancel a job that has not been claimed yet
    ///
    /// A `printing` job cannot be preempted; the in-flight write resolves
    /// naturally.
    pub fn cancel(&self, job_id: &str) -> PrintingResult<PrintJob> {
        let _guard = self.guard.lock();
        let mut job = self.load(job_id)?;
        if job.status != PrintJobStatus::Queued {
            return Err(PrintingError::InvalidState(format!(
                "cannot cancel job {job_id} in {:?} state",
                job.status
            )));
        }
        job.status = PrintJobStatus::Failed;
        job.error = Some("cancelled".to_string());
        self.storage.store_job(&job)?;
        Ok(job)
    }

    /// Fetch a job
    pub fn get(&self, job_id: &str) -> PrintingResult<PrintJob> {
        self.load(job_id)
    }

    /// All of a restaurant's jobs, most recent first
    pub fn list_queue(&self, restaurant_id: &str) -> PrintingResult<Vec<PrintJob>> {
        Ok(self.storage.list_jobs_for_restaurant(restaurant_id)?)
    }

    /// Fail every queued job referencing a printer (printer removal)
    pub fn fail_jobs_for_printer(&self, printer_id: &str, reason: &str) -> PrintingResult<usize> {
        let _guard = self.guard.lock();
        let mut failed = 0;
        for mut job in self.storage.list_jobs_for_printer(printer_id)? {
            if job.status == PrintJobStatus::Queued {
                job.status = PrintJobStatus::Failed;
                job.error = Some(reason.to_string());
                self.storage.store_job(&job)?;
                failed += 1;
            }
        }
        Ok(failed)
    }

    /// Recovery sweep: reclaim `printing` jobs orphaned by a crash
    ///
    /// A job claimed longer than `threshold_ms` ago counts as an interrupted
    /// attempt: it is requeued while attempts remain, otherwise settled as
    /// failed. Returns the number of reclaimed jobs.
    pub fn reclaim_stale(&self, threshold_ms: i64) -> PrintingResult<usize> {
        let _guard = self.guard.lock();
        let now = self.clock.now_millis();
        let mut reclaimed = 0;
        for mut job in self.storage.list_jobs()? {
            if job.status == PrintJobStatus::Printing
                && job.started_at.is_some_and(|t| now - t >= threshold_ms)
            {
                tracing::warn!(
                    job_id = %job.id,
                    printer_id = %job.printer_id,
                    "Reclaiming orphaned printing job"
                );
                self.apply_failure(&mut job, "reclaimed: interrupted while printing")?;
                reclaimed += 1;
            }
        }
        Ok(reclaimed)
    }

    /// Strictly increasing creation timestamp
    fn next_created_at(&self) -> i64 {
        let now = self.clock.now_millis();
        let prev = self
            .last_created
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(last.max(now - 1) + 1)
            })
            .unwrap_or(now - 1);
        prev.max(now - 1) + 1
    }

    fn load(&self, job_id: &str) -> PrintingResult<PrintJob> {
        self.storage
            .get_job(job_id)?
            .ok_or_else(|| PrintingError::JobNotFound(job_id.to_string()))
    }

    /// Shared failure bookkeeping for `mark_failed` and the stale sweep
    fn apply_failure(&self, job: &mut PrintJob, error: &str) -> PrintingResult<()> {
        job.attempts += 1;
        job.started_at = None;
        job.error = Some(error.to_string());
        if job.attempts < job.max_attempts {
            job.status = PrintJobStatus::Queued;
            job.not_before = self.clock.now_millis() + self.policy.backoff_ms(job.attempts);
            tracing::warn!(
                job_id = %job.id,
                attempts = job.attempts,
                not_before = job.not_before,
                error = %error,
                "Print attempt failed, requeued with backoff"
            );
        } else {
            job.status = PrintJobStatus::Failed;
            tracing::error!(
                job_id = %job.id,
                attempts = job.attempts,
                error = %error,
                "Print job failed permanently"
            );
        }
        self.storage.store_job(job)?;
        Ok(())
    }
}
