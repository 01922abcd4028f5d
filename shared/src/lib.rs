//! Shared domain models for the Ember order backend
//!
//! This crate holds the entities exchanged between the server, workers and
//! tooling:
//!
//! - **Order** (`models::order`): order entity, items, guest identity,
//!   status lifecycle
//! - **Printer** (`models::printer`): printer configuration with a typed
//!   connection variant per transport
//! - **PrintJob** (`models::print_job`): queued print work with retry
//!   bookkeeping
//!
//! Business logic stays in `ember-server`; this crate only defines the data
//! shapes and the pure rules that belong to them (e.g. which order status
//! transitions are legal).

pub mod models;
pub mod util;

pub use models::order::{
    BulkStatusResult, BulkStatusUpdate, CancelRequest, GuestInfo, Order, OrderCreate, OrderItem,
    OrderStatus, Orderer, StatusUpdate,
};
pub use models::print_job::{
    print_type_for, PrintJob, PrintJobStatus, PrintRequest, PrintType, DEFAULT_MAX_ATTEMPTS,
};
pub use models::printer::{
    ConnectionKind, Printer, PrinterConnection, PrinterCreate, PrinterKind, PrinterStatus,
    PrinterUpdate, TestConnectionReport,
};
