//! Transport construction
//!
//! The dispatcher and the registry build transports through this factory
//! seam so tests can substitute scripted transports for real devices.

use ember_printer::{
    BluetoothTransport, NetworkTransport, PrintResult, Transport, UsbTransport,
};
use shared::PrinterConnection;
use std::time::Duration;

/// Builds a transport for a printer's connection configuration
pub trait TransportFactory: Send + Sync {
    fn connect(&self, connection: &PrinterConnection) -> PrintResult<Box<dyn Transport>>;
}

/// Production factory backed by real device transports
pub struct DeviceTransportFactory {
    timeout: Duration,
}

impl DeviceTransportFactory {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl TransportFactory for DeviceTransportFactory {
    fn connect(&self, connection: &PrinterConnection) -> PrintResult<Box<dyn Transport>> {
        Ok(match connection {
            PrinterConnection::Network { ip_address, port } => Box::new(
                NetworkTransport::new(ip_address, *port)?.with_timeout(self.timeout),
            ),
            PrinterConnection::Usb { usb_device } => {
                Box::new(UsbTransport::new(usb_device).with_timeout(self.timeout))
            }
            PrinterConnection::Bluetooth => {
                Box::new(BluetoothTransport::new().with_timeout(self.timeout))
            }
        })
    }
}
