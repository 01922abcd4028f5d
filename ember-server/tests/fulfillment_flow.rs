//! End-to-end fulfillment flow: order placement → auto-print → dispatch
//!
//! Exercises the full pipeline against scripted transports: the status
//! machine broadcasts, the coordinator enqueues, per-printer workers
//! deliver, retry and settle.

use async_trait::async_trait;
use ember_printer::{PrintError, PrintResult, Transport};
use ember_server::printing::{
    DispatchConfig, EscPosTicketRenderer, FulfillmentCoordinator, PrintDispatcher, PrintJobQueue,
    PrinterRegistry, RetryPolicy, TransportFactory,
};
use ember_server::utils::{Clock, SystemClock};
use ember_server::{OrderStatusMachine, Storage};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use shared::{
    ConnectionKind, GuestInfo, OrderCreate, OrderItem, OrderStatus, Orderer, PrintJobStatus,
    PrintType, PrinterConnection, PrinterCreate, PrinterKind,
};
use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Scripted transport shared by every printer in the test
#[derive(Clone, Default)]
struct ScriptedTransport {
    outcomes: Arc<Mutex<VecDeque<Result<(), String>>>>,
    sends: Arc<Mutex<Vec<Vec<u8>>>>,
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, data: &[u8]) -> PrintResult<()> {
        match self.outcomes.lock().pop_front().unwrap_or(Ok(())) {
            Ok(()) => {
                self.sends.lock().push(data.to_vec());
                Ok(())
            }
            Err(msg) => Err(PrintError::Connection(msg)),
        }
    }

    async fn probe(&self) -> PrintResult<()> {
        Ok(())
    }
}

struct ScriptedFactory(ScriptedTransport);

impl TransportFactory for ScriptedFactory {
    fn connect(&self, _connection: &PrinterConnection) -> PrintResult<Box<dyn Transport>> {
        Ok(Box::new(self.0.clone()))
    }
}

struct World {
    storage: Storage,
    machine: Arc<OrderStatusMachine>,
    registry: Arc<PrinterRegistry>,
    queue: Arc<PrintJobQueue>,
    dispatcher: Arc<PrintDispatcher>,
    coordinator: Arc<FulfillmentCoordinator>,
    transport: ScriptedTransport,
    shutdown: CancellationToken,
}

fn world(policy: RetryPolicy) -> World {
    let storage = Storage::open_in_memory().unwrap();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let transport = ScriptedTransport::default();
    let factory: Arc<dyn TransportFactory> = Arc::new(ScriptedFactory(transport.clone()));

    let queue = Arc::new(PrintJobQueue::new(
        storage.clone(),
        Arc::clone(&clock),
        policy,
    ));
    let registry = Arc::new(PrinterRegistry::new(
        storage.clone(),
        Arc::clone(&queue),
        Arc::clone(&factory),
        Arc::clone(&clock),
        Duration::from_millis(500),
    ));
    let shutdown = CancellationToken::new();
    let dispatcher = Arc::new(PrintDispatcher::new(
        storage.clone(),
        Arc::clone(&queue),
        Arc::clone(&registry),
        Arc::new(EscPosTicketRenderer::default()),
        factory,
        Arc::clone(&clock),
        DispatchConfig {
            send_timeout: Duration::from_millis(500),
            tick_interval: Duration::from_millis(50),
        },
        shutdown.child_token(),
    ));
    let machine = Arc::new(OrderStatusMachine::new(storage.clone(), clock));
    let coordinator = Arc::new(FulfillmentCoordinator::new(
        Arc::clone(&registry),
        Arc::clone(&queue),
        Arc::clone(&dispatcher),
    ));

    // Run the coordinator the way the server does
    let events = machine.subscribe();
    let worker = Arc::clone(&coordinator);
    let token = shutdown.child_token();
    tokio::spawn(async move {
        worker.run(events, token).await;
    });

    World {
        storage,
        machine,
        registry,
        queue,
        dispatcher,
        coordinator,
        transport,
        shutdown,
    }
}

fn kitchen_printer(auto_print: bool) -> PrinterCreate {
    PrinterCreate {
        name: "Kitchen main".to_string(),
        kind: PrinterKind::Kitchen,
        connection_type: ConnectionKind::Network,
        ip_address: Some("192.168.1.60".to_string()),
        port: Some(9100),
        usb_device: None,
        auto_print_orders: auto_print,
        enabled: true,
    }
}

fn guest_order() -> OrderCreate {
    OrderCreate {
        restaurant_id: "r-1".to_string(),
        orderer: Orderer::Guest {
            guest_info: GuestInfo {
                name: "Ana".to_string(),
                phone: "+34600111222".to_string(),
                email: "ana@example.com".to_string(),
            },
        },
        items: vec![
            OrderItem {
                name: "Burger".to_string(),
                price: Decimal::from_str("15.99").unwrap(),
                quantity: 1,
                modifications: vec![],
            },
            OrderItem {
                name: "Fries".to_string(),
                price: Decimal::from_str("8.99").unwrap(),
                quantity: 2,
                modifications: vec![],
            },
        ],
        notes: None,
    }
}

async fn wait_until(mut check: impl FnMut() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached within 4s");
}

#[tokio::test(flavor = "multi_thread")]
async fn order_placement_totals_and_status() {
    let w = world(RetryPolicy::default());
    let order = w.machine.create_order(guest_order()).unwrap();
    assert_eq!(order.total_price, Decimal::from_str("33.97").unwrap());
    assert_eq!(order.status, OrderStatus::Received);
    w.shutdown.cancel();
}

#[tokio::test(flavor = "multi_thread")]
async fn placing_an_order_auto_prints_one_kitchen_ticket() {
    let w = world(RetryPolicy::default());
    let printer = w.registry.create("r-1", kitchen_printer(true)).unwrap();
    w.dispatcher.ensure_worker(&printer.id);

    let order = w.machine.create_order(guest_order()).unwrap();

    // Exactly one kitchen_ticket job appears and gets delivered
    let queue = Arc::clone(&w.queue);
    wait_until(move || {
        let jobs = queue.list_queue("r-1").unwrap();
        jobs.len() == 1 && jobs[0].status == PrintJobStatus::Completed
    })
    .await;

    let jobs = w.queue.list_queue("r-1").unwrap();
    assert_eq!(jobs[0].print_type, PrintType::KitchenTicket);
    assert_eq!(jobs[0].order_id, order.id);
    assert_eq!(w.transport.sends.lock().len(), 1);

    // The delivered payload is the kitchen ticket for this order
    let payload = w.transport.sends.lock()[0].clone();
    let text = String::from_utf8_lossy(&payload).into_owned();
    assert!(text.contains("Burger"));

    // An explicit reprint request delivers a second ticket
    w.coordinator
        .print_order(&order.id, &printer.id, PrintType::KitchenTicket)
        .unwrap();
    let transport = w.transport.clone();
    wait_until(move || transport.sends.lock().len() == 2).await;
    w.shutdown.cancel();
}

#[tokio::test(flavor = "multi_thread")]
async fn auto_print_skips_printers_without_the_flag() {
    let w = world(RetryPolicy::default());
    w.registry.create("r-1", kitchen_printer(false)).unwrap();

    w.machine.create_order(guest_order()).unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(w.queue.list_queue("r-1").unwrap().is_empty());
    w.shutdown.cancel();
}

#[tokio::test(flavor = "multi_thread")]
async fn kitchen_and_receipt_printers_get_matching_tickets() {
    let w = world(RetryPolicy::default());
    w.registry.create("r-1", kitchen_printer(true)).unwrap();
    let mut receipt = kitchen_printer(true);
    receipt.name = "Counter".to_string();
    receipt.kind = PrinterKind::Receipt;
    w.registry.create("r-1", receipt).unwrap();

    w.machine.create_order(guest_order()).unwrap();

    let queue = Arc::clone(&w.queue);
    wait_until(move || {
        let jobs = queue.list_queue("r-1").unwrap();
        jobs.len() == 2 && jobs.iter().all(|j| j.status == PrintJobStatus::Completed)
    })
    .await;

    let jobs = w.queue.list_queue("r-1").unwrap();
    let mut types: Vec<_> = jobs.iter().map(|j| j.print_type).collect();
    types.sort_by_key(|t| format!("{t:?}"));
    assert_eq!(types, vec![PrintType::KitchenTicket, PrintType::Receipt]);
    w.shutdown.cancel();
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_delivery_retries_then_settles_and_manual_retry_recovers() {
    let policy = RetryPolicy {
        max_attempts: 2,
        backoff_base_ms: 20,
        backoff_cap_ms: 100,
    };
    let w = world(policy);
    let printer = w.registry.create("r-1", kitchen_printer(true)).unwrap();
    w.dispatcher.ensure_worker(&printer.id);

    // Both automatic attempts fail; the job settles as failed
    w.transport.outcomes.lock().extend([
        Err("paper jam".to_string()),
        Err("paper jam".to_string()),
    ]);
    w.machine.create_order(guest_order()).unwrap();

    let queue = Arc::clone(&w.queue);
    wait_until(move || {
        queue
            .list_queue("r-1")
            .unwrap()
            .iter()
            .any(|j| j.status == PrintJobStatus::Failed && j.attempts == 2)
    })
    .await;

    // Manual retry succeeds with a healthy transport
    let job_id = w.queue.list_queue("r-1").unwrap()[0].id.clone();
    let job = w.queue.retry(&job_id).unwrap();
    w.dispatcher.notify(&job.printer_id);

    let queue = Arc::clone(&w.queue);
    let retried = job_id.clone();
    wait_until(move || {
        queue
            .list_queue("r-1")
            .unwrap()
            .iter()
            .any(|j| j.id == retried && j.status == PrintJobStatus::Completed)
    })
    .await;
    w.shutdown.cancel();
}

#[tokio::test(flavor = "multi_thread")]
async fn deleting_a_printer_fails_its_queued_jobs() {
    let w = world(RetryPolicy::default());
    // No auto-print and no worker: the job stays queued
    let printer = w.registry.create("r-1", kitchen_printer(false)).unwrap();
    let order = w.machine.create_order(guest_order()).unwrap();
    let job = w
        .queue
        .enqueue(&order.id, &printer.id, PrintType::KitchenTicket)
        .unwrap();

    w.registry.delete("r-1", &printer.id).unwrap();

    let after = w.queue.get(&job.id).unwrap();
    assert_eq!(after.status, PrintJobStatus::Failed);
    assert_eq!(after.error.as_deref(), Some("printer removed"));

    // Storage no longer knows the printer
    assert!(w.storage.get_printer(&printer.id).unwrap().is_none());
    w.shutdown.cancel();
}
