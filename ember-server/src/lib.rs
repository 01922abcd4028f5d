//! Ember Server - restaurant order fulfillment and print dispatch backend
//!
//! # Architecture overview
//!
//! - **Orders** (`orders`): guarded status machine for the order lifecycle,
//!   single and bulk transitions, domain events
//! - **Printing** (`printing`): printer registry, durable print queue,
//!   per-printer dispatch workers, fulfillment coordinator
//! - **Database** (`db`): embedded redb storage
//! - **HTTP API** (`api`): axum routes and handlers
//!
//! # Module structure
//!
//! ```text
//! ember-server/src/
//! ├── core/          # configuration, server state
//! ├── auth/          # authenticated principal (installed by middleware)
//! ├── api/           # HTTP routes and handlers
//! ├── db/            # storage layer
//! ├── orders/        # order status machine
//! ├── printing/      # registry, queue, dispatcher, coordinator
//! └── utils/         # errors, logging, clock, validation
//! ```

pub mod api;
pub mod auth;
pub mod core;
pub mod db;
pub mod orders;
pub mod printing;
pub mod utils;

// Re-export public types
pub use auth::Principal;
pub use core::{Config, ServerState};
pub use db::Storage;
pub use orders::{OrderStatusChanged, OrderStatusMachine};
pub use printing::{
    FulfillmentCoordinator, PrintDispatcher, PrintJobQueue, PrinterRegistry,
};
pub use utils::{AppError, AppResult};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};
