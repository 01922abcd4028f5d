//! FulfillmentCoordinator - bridges order events to print jobs
//!
//! Listens to the status machine's broadcast channel. When an order is
//! placed, every enabled printer of the restaurant with auto-print on gets
//! a job matching its kind; explicit print requests bypass the auto-print
//! flag. A failure to enqueue for one printer never blocks the others.

use shared::{print_type_for, PrintJob, PrintType};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{PrintDispatcher, PrintJobQueue, PrinterRegistry, PrintingResult};
use crate::orders::OrderStatusChanged;
use shared::OrderStatus;

/// Fulfillment coordinator
pub struct FulfillmentCoordinator {
    registry: Arc<PrinterRegistry>,
    queue: Arc<PrintJobQueue>,
    dispatcher: Arc<PrintDispatcher>,
}

impl FulfillmentCoordinator {
    pub fn new(
        registry: Arc<PrinterRegistry>,
        queue: Arc<PrintJobQueue>,
        dispatcher: Arc<PrintDispatcher>,
    ) -> Self {
        Self {
            registry,
            queue,
            dispatcher,
        }
    }

    /// Run the coordinator (blocks until shutdown or channel close)
    pub async fn run(
        &self,
        mut events: broadcast::Receiver<OrderStatusChanged>,
        shutdown: CancellationToken,
    ) {
        info!("Fulfillment coordinator started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Fulfillment coordinator received shutdown signal");
                    break;
                }
                event = events.recv() => {
                    match event {
                        Ok(event) => self.handle_event(&event),
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!(skipped = n, "Fulfillment coordinator lagged, events skipped");
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            info!("Event channel closed, fulfillment coordinator stopping");
                            break;
                        }
                    }
                }
            }
        }
    }

    fn handle_event(&self, event: &OrderStatusChanged) {
        // Auto-print fires when the order lands (placement into `received`)
        if event.new_status == OrderStatus::Received {
            self.auto_print(&event.restaurant_id, &event.order_id);
        }
    }

    /// Enqueue jobs for every auto-print printer of the restaurant
    pub fn auto_print(&self, restaurant_id: &str, order_id: &str) {
        let printers = match self.registry.list(restaurant_id, true) {
            Ok(printers) => printers,
            Err(e) => {
                warn!(
                    restaurant_id = %restaurant_id,
                    error = %e,
                    "Failed to list printers for auto-print"
                );
                return;
            }
        };

        for printer in printers.into_iter().filter(|p| p.auto_print_orders) {
            match self
                .queue
                .enqueue(order_id, &printer.id, print_type_for(printer.kind))
            {
                Ok(job) => {
                    self.dispatcher.notify(&printer.id);
                    info!(
                        job_id = %job.id,
                        printer = %printer.name,
                        print_type = ?job.print_type,
                        "Auto-print job enqueued"
                    );
                }
                // One printer's trouble (e.g. deleted concurrently) never
                // blocks the rest
                Err(e) => {
                    warn!(
                        printer_id = %printer.id,
                        order_id = %order_id,
                        error = %e,
                        "Auto-print enqueue failed, skipping printer"
                    );
                }
            }
        }
    }

    /// Explicit "print this order" request
    pub fn print_order(
        &self,
        order_id: &str,
        printer_id: &str,
        print_type: PrintType,
    ) -> PrintingResult<PrintJob> {
        let job = self.queue.enqueue(order_id, printer_id, print_type)?;
        self.dispatcher.notify(printer_id);
        Ok(job)
    }
}
