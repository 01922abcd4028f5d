//! Print pipeline
//!
//! ```text
//! OrderStatusMachine ──broadcast──► FulfillmentCoordinator
//!                                        │ enqueue + wake
//!                                        ▼
//!                                  PrintJobQueue ◄── PrinterRegistry
//!                                        │               (config, probes)
//!                         one worker per printer
//!                                        ▼
//!                                  PrintDispatcher ──► Transport (tcp/usb/bt)
//! ```

mod coordinator;
mod dispatcher;
mod error;
mod queue;
mod registry;
mod renderer;
mod transport;

pub use coordinator::FulfillmentCoordinator;
pub use dispatcher::{DispatchConfig, PrintDispatcher};
pub use error::{PrintingError, PrintingResult};
pub use queue::{PrintJobQueue, RetryPolicy};
pub use registry::PrinterRegistry;
pub use renderer::{EscPosTicketRenderer, TicketRenderer};
pub use transport::{DeviceTransportFactory, TransportFactory};
