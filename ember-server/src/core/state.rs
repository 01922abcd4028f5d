//! Server state - wires storage, the status machine and the print pipeline

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::db::Storage;
use crate::orders::OrderStatusMachine;
use crate::printing::{
    DeviceTransportFactory, DispatchConfig, EscPosTicketRenderer, FulfillmentCoordinator,
    PrintDispatcher, PrintJobQueue, PrinterRegistry, RetryPolicy, TicketRenderer,
    TransportFactory,
};
use crate::utils::{Clock, SystemClock};

use super::Config;

/// Shared server state
#[derive(Clone)]
pub struct ServerState {
    pub config: Arc<Config>,
    pub machine: Arc<OrderStatusMachine>,
    pub registry: Arc<PrinterRegistry>,
    pub queue: Arc<PrintJobQueue>,
    pub dispatcher: Arc<PrintDispatcher>,
    pub coordinator: Arc<FulfillmentCoordinator>,
    shutdown: CancellationToken,
}

impl ServerState {
    /// Initialize with the on-disk database under `config.work_dir`
    pub fn initialize(config: Config) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&config.work_dir)?;
        let db_path = std::path::Path::new(&config.work_dir).join("ember.redb");
        let storage = Storage::open(db_path)?;
        Ok(Self::build(config, storage, Arc::new(SystemClock)))
    }

    /// Initialize with explicit storage and clock (tests)
    pub fn with_storage(config: Config, storage: Storage, clock: Arc<dyn Clock>) -> Self {
        Self::build(config, storage, clock)
    }

    fn build(config: Config, storage: Storage, clock: Arc<dyn Clock>) -> Self {
        let shutdown = CancellationToken::new();

        let policy = RetryPolicy {
            max_attempts: config.print_max_attempts,
            backoff_base_ms: config.backoff_base_ms,
            backoff_cap_ms: config.backoff_cap_ms,
        };
        let queue = Arc::new(PrintJobQueue::new(
            storage.clone(),
            Arc::clone(&clock),
            policy,
        ));

        let transports: Arc<dyn TransportFactory> = Arc::new(DeviceTransportFactory::new(
            Duration::from_millis(config.send_timeout_ms),
        ));
        let registry = Arc::new(PrinterRegistry::new(
            storage.clone(),
            Arc::clone(&queue),
            Arc::clone(&transports),
            Arc::clone(&clock),
            Duration::from_millis(config.probe_timeout_ms),
        ));

        let renderer: Arc<dyn TicketRenderer> =
            Arc::new(EscPosTicketRenderer::new(config.paper_width));
        let dispatcher = Arc::new(PrintDispatcher::new(
            storage.clone(),
            Arc::clone(&queue),
            Arc::clone(&registry),
            renderer,
            transports,
            Arc::clone(&clock),
            DispatchConfig {
                send_timeout: Duration::from_millis(config.send_timeout_ms),
                tick_interval: Duration::from_secs(5),
            },
            shutdown.child_token(),
        ));

        let machine = Arc::new(OrderStatusMachine::new(storage.clone(), Arc::clone(&clock)));
        let coordinator = Arc::new(FulfillmentCoordinator::new(
            Arc::clone(&registry),
            Arc::clone(&queue),
            Arc::clone(&dispatcher),
        ));

        Self {
            config: Arc::new(config),
            machine,
            registry,
            queue,
            dispatcher,
            coordinator,
            shutdown,
        }
    }

    /// Start background work: recovery sweep, printer workers, coordinator
    pub fn start_workers(&self) {
        match self.queue.reclaim_stale(self.config.stale_printing_ms) {
            Ok(0) => {}
            Ok(n) => tracing::warn!(reclaimed = n, "Recovered orphaned printing jobs"),
            Err(e) => tracing::error!(error = %e, "Stale job sweep failed"),
        }

        self.dispatcher.start();

        let coordinator = Arc::clone(&self.coordinator);
        let events = self.machine.subscribe();
        let shutdown = self.shutdown.child_token();
        tokio::spawn(async move {
            coordinator.run(events, shutdown).await;
        });
    }

    /// Cancellation token observed by all background tasks
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Stop background tasks
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}
