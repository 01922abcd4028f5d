//! PrintDispatcher - one worker per printer
//!
//! Each enabled printer gets a long-lived worker task that owns that
//! printer's queue: `idle → claiming → sending → idle`. Per-printer
//! serialization is structural (a printer has exactly one consumer), while
//! workers for different printers run fully in parallel.
//!
//! Workers never busy-poll: they sleep until woken by an enqueue
//! notification, by the maturity of a backoff gate, or by a coarse safety
//! tick.

use parking_lot::Mutex;
use shared::{PrinterStatus, PrintJob};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::{PrintJobQueue, PrinterRegistry, TicketRenderer, TransportFactory};
use crate::db::Storage;
use crate::utils::Clock;

/// Dispatch tuning knobs
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Bound on a single transport send (connect + write)
    pub send_timeout: Duration,
    /// Idle safety tick; an upper bound on worker sleep
    pub tick_interval: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            send_timeout: Duration::from_secs(10),
            tick_interval: Duration::from_secs(5),
        }
    }
}

struct WorkerHandle {
    wake: Arc<Notify>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Everything a worker task needs, cheap to clone
struct WorkerCtx {
    printer_id: String,
    storage: Storage,
    queue: Arc<PrintJobQueue>,
    registry: Arc<PrinterRegistry>,
    renderer: Arc<dyn TicketRenderer>,
    transports: Arc<dyn TransportFactory>,
    clock: Arc<dyn Clock>,
    config: DispatchConfig,
}

/// Print dispatcher
pub struct PrintDispatcher {
    storage: Storage,
    queue: Arc<PrintJobQueue>,
    registry: Arc<PrinterRegistry>,
    renderer: Arc<dyn TicketRenderer>,
    transports: Arc<dyn TransportFactory>,
    clock: Arc<dyn Clock>,
    config: DispatchConfig,
    workers: Mutex<HashMap<String, WorkerHandle>>,
    shutdown: CancellationToken,
}

impl PrintDispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        storage: Storage,
        queue: Arc<PrintJobQueue>,
        registry: Arc<PrinterRegistry>,
        renderer: Arc<dyn TicketRenderer>,
        transports: Arc<dyn TransportFactory>,
        clock: Arc<dyn Clock>,
        config: DispatchConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            storage,
            queue,
            registry,
            renderer,
            transports,
            clock,
            config,
            workers: Mutex::new(HashMap::new()),
            shutdown,
        }
    }

    /// Spawn workers for every enabled printer (startup)
    pub fn start(&self) {
        match self.storage.list_all_printers() {
            Ok(printers) => {
                for printer in printers.iter().filter(|p| p.enabled) {
                    self.ensure_worker(&printer.id);
                }
            }
            Err(e) => error!(error = %e, "Failed to enumerate printers at dispatcher start"),
        }
    }

    /// Make sure an enabled printer has a running worker
    ///
    /// Disabled or removed printers get no worker; a stale worker for such a
    /// printer is stopped instead.
    pub fn ensure_worker(&self, printer_id: &str) {
        let wanted = matches!(
            self.storage.get_printer(printer_id),
            Ok(Some(ref p)) if p.enabled
        );
        if !wanted {
            self.stop_worker(printer_id);
            return;
        }

        let mut workers = self.workers.lock();
        if let Some(handle) = workers.get(printer_id)
            && !handle.task.is_finished()
        {
            return;
        }

        let wake = Arc::new(Notify::new());
        let cancel = self.shutdown.child_token();
        let ctx = WorkerCtx {
            printer_id: printer_id.to_string(),
            storage: self.storage.clone(),
            queue: Arc::clone(&self.queue),
            registry: Arc::clone(&self.registry),
            renderer: Arc::clone(&self.renderer),
            transports: Arc::clone(&self.transports),
            clock: Arc::clone(&self.clock),
            config: self.config.clone(),
        };
        let task = tokio::spawn(run_worker(ctx, Arc::clone(&wake), cancel.clone()));
        workers.insert(
            printer_id.to_string(),
            WorkerHandle { wake, cancel, task },
        );
        info!(printer_id = %printer_id, "Print worker started");
    }

    /// Stop a printer's worker (disable or removal)
    ///
    /// An in-flight send finishes naturally; the worker exits at the next
    /// loop turn.
    pub fn stop_worker(&self, printer_id: &str) {
        if let Some(handle) = self.workers.lock().remove(printer_id) {
            handle.cancel.cancel();
            info!(printer_id = %printer_id, "Print worker stopped");
        }
    }

    /// Nudge a printer's worker after an enqueue
    pub fn notify(&self, printer_id: &str) {
        self.ensure_worker(printer_id);
        if let Some(handle) = self.workers.lock().get(printer_id) {
            handle.wake.notify_one();
        }
    }

    /// Stop all workers
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        self.workers.lock().clear();
    }
}

/// Worker loop for one printer
async fn run_worker(ctx: WorkerCtx, wake: Arc<Notify>, cancel: CancellationToken) {
    loop {
        if cancel.is_cancelled() {
            break;
        }

        match ctx.queue.dequeue_next(&ctx.printer_id) {
            Ok(Some(job)) => {
                process_job(&ctx, job).await;
                continue;
            }
            Ok(None) => {}
            Err(e) => {
                error!(printer_id = %ctx.printer_id, error = %e, "Dequeue failed");
            }
        }

        // Idle: sleep until a wake signal, the earliest backoff gate, or the
        // safety tick, whichever comes first.
        let tick_ms = ctx.config.tick_interval.as_millis() as i64;
        let sleep_ms = match ctx.queue.next_wake_at(&ctx.printer_id) {
            Ok(Some(at)) => (at - ctx.clock.now_millis()).clamp(10, tick_ms),
            _ => tick_ms,
        };

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = wake.notified() => {}
            _ = tokio::time::sleep(Duration::from_millis(sleep_ms as u64)) => {}
        }
    }
    info!(printer_id = %ctx.printer_id, "Print worker exiting");
}

/// One delivery attempt: claim, render, send, record
async fn process_job(ctx: &WorkerCtx, job: PrintJob) {
    // Claim explicitly; losing the claim (e.g. job cancelled in between) is
    // not an error for the worker.
    let job = match ctx.queue.mark_printing(&job.id) {
        Ok(job) => job,
        Err(e) => {
            warn!(job_id = %job.id, error = %e, "Job claim lost");
            return;
        }
    };

    let order = match ctx.storage.get_order(&job.order_id) {
        Ok(Some(order)) => order,
        Ok(None) => {
            record_failure(ctx, &job, "order no longer exists", false).await;
            return;
        }
        Err(e) => {
            record_failure(ctx, &job, &format!("storage error: {e}"), false).await;
            return;
        }
    };
    let printer = match ctx.storage.get_printer(&job.printer_id) {
        Ok(Some(printer)) => printer,
        _ => {
            record_failure(ctx, &job, "printer removed", false).await;
            return;
        }
    };

    let payload = ctx.renderer.render(&order, job.print_type);

    let attempt = async {
        let transport = ctx.transports.connect(&printer.connection)?;
        transport.send(&payload).await
    };
    let outcome = tokio::time::timeout(ctx.config.send_timeout, attempt).await;

    match outcome {
        Ok(Ok(())) => {
            if let Err(e) = ctx.queue.mark_completed(&job.id) {
                error!(job_id = %job.id, error = %e, "Failed to record completion");
            }
            if let Err(e) = ctx.registry.set_status(&job.printer_id, PrinterStatus::Online) {
                warn!(printer_id = %job.printer_id, error = %e, "Failed to update printer status");
            }
            info!(
                job_id = %job.id,
                printer_id = %job.printer_id,
                bytes = payload.len(),
                "Print job delivered"
            );
        }
        Ok(Err(e)) => record_failure(ctx, &job, &e.to_string(), true).await,
        Err(_) => {
            let msg = format!(
                "send timed out after {}ms",
                ctx.config.send_timeout.as_millis()
            );
            record_failure(ctx, &job, &msg, true).await;
        }
    }
}

/// Record a failed attempt; `printer_fault` controls the status flip
async fn record_failure(ctx: &WorkerCtx, job: &PrintJob, message: &str, printer_fault: bool) {
    if let Err(e) = ctx.queue.mark_failed(&job.id, message) {
        error!(job_id = %job.id, error = %e, "Failed to record failure");
    }
    if printer_fault
        && let Err(e) = ctx.registry.set_status(&job.printer_id, PrinterStatus::Error)
    {
        warn!(printer_id = %job.printer_id, error = %e, "Failed to update printer status");
    }
}
