//! # ember-printer
//!
//! ESC/POS thermal printer library - low-level delivery capabilities only.
//!
//! ## Scope
//!
//! This crate handles HOW bytes reach a printer:
//! - ESC/POS command building
//! - GBK encoding for thermal printers
//! - Network delivery (raw TCP, port 9100)
//! - USB delivery (character device path)
//! - Bluetooth delivery (pre-paired RFCOMM device)
//!
//! Business logic (WHAT to print) stays in application code: ticket and
//! receipt rendering live in `ember-server`.
//!
//! ## Example
//!
//! ```ignore
//! use ember_printer::{EscPosBuilder, NetworkTransport, Transport};
//!
//! let mut builder = EscPosBuilder::new(48);
//! builder.center();
//! builder.double_size();
//! builder.line("KITCHEN");
//! builder.reset_size();
//! builder.sep_double();
//! builder.left();
//! builder.line("Table 12");
//! builder.cut();
//!
//! let printer = NetworkTransport::new("192.168.1.100", 9100)?;
//! printer.send(&builder.build()).await?;
//! ```

mod encoding;
mod error;
mod escpos;
mod transport;

// Re-exports
pub use encoding::{encode_gbk, gbk_width, pad_gbk, truncate_gbk};
pub use error::{PrintError, PrintResult};
pub use escpos::EscPosBuilder;
pub use transport::{BluetoothTransport, NetworkTransport, Transport, UsbTransport};
