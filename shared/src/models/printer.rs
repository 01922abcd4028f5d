//! Printer Model

use serde::{Deserialize, Serialize};

/// What a printer is used for
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PrinterKind {
    Kitchen,
    Receipt,
    Label,
}

/// Transport used to reach the device
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionKind {
    Network,
    Usb,
    Bluetooth,
}

/// Connection configuration, one variant per transport
///
/// Each variant carries only the fields its transport needs, so downstream
/// code never probes optional fields at runtime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "connection_type", rename_all = "snake_case")]
pub enum PrinterConnection {
    Network { ip_address: String, port: u16 },
    Usb { usb_device: String },
    Bluetooth,
}

impl PrinterConnection {
    pub fn kind(&self) -> ConnectionKind {
        match self {
            PrinterConnection::Network { .. } => ConnectionKind::Network,
            PrinterConnection::Usb { .. } => ConnectionKind::Usb,
            PrinterConnection::Bluetooth => ConnectionKind::Bluetooth,
        }
    }
}

/// Last known reachability of a printer
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PrinterStatus {
    Online,
    Offline,
    Error,
    #[default]
    Unknown,
}

/// Printer entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Printer {
    pub id: String,
    pub restaurant_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: PrinterKind,
    #[serde(flatten)]
    pub connection: PrinterConnection,
    pub auto_print_orders: bool,
    pub enabled: bool,
    pub status: PrinterStatus,
    /// Unix millis
    pub created_at: i64,
    /// Unix millis
    pub updated_at: i64,
}

/// Create printer payload
///
/// Connection fields are kept loose here so validation can report every
/// missing or invalid field at once before the typed
/// [`PrinterConnection`] is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrinterCreate {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: PrinterKind,
    pub connection_type: ConnectionKind,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub port: Option<u32>,
    #[serde(default)]
    pub usb_device: Option<String>,
    #[serde(default)]
    pub auto_print_orders: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Update printer payload (partial merge, then full re-validation)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PrinterUpdate {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<PrinterKind>,
    pub connection_type: Option<ConnectionKind>,
    pub ip_address: Option<String>,
    pub port: Option<u32>,
    pub usb_device: Option<String>,
    pub auto_print_orders: Option<bool>,
    pub enabled: Option<bool>,
}

fn default_true() -> bool {
    true
}

/// Outcome of a connectivity probe. Always returned, never thrown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestConnectionReport {
    pub success: bool,
    pub message: String,
    /// Unix millis at probe completion
    pub timestamp: i64,
}
