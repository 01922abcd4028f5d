//! Printer transports
//!
//! Supports:
//! - Network printers (raw TCP, port 9100)
//! - USB printers (write to the character device path)
//! - Bluetooth printers (pre-paired RFCOMM serial device)

use crate::error::{PrintError, PrintResult};
use async_trait::async_trait;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{info, instrument, warn};

/// Default RFCOMM device bound to a pre-paired Bluetooth printer
const DEFAULT_RFCOMM_DEVICE: &str = "/dev/rfcomm0";

/// Trait for printer transports
///
/// Implementations deliver raw ESC/POS bytes and answer reachability probes.
/// Both operations are expected to be time-bounded by the caller; `send` and
/// `probe` apply their own internal timeouts as a second line of defense.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver raw ESC/POS data to the printer
    async fn send(&self, data: &[u8]) -> PrintResult<()>;

    /// Check that the printer is reachable without printing anything
    async fn probe(&self) -> PrintResult<()>;
}

/// Network printer (raw TCP, port 9100)
///
/// Most thermal printers accept raw printing on TCP port 9100.
#[derive(Debug, Clone)]
pub struct NetworkTransport {
    addr: SocketAddr,
    timeout: Duration,
}

impl NetworkTransport {
    /// Create a new network transport
    pub fn new(host: &str, port: u16) -> PrintResult<Self> {
        let addr_str = format!("{}:{}", host, port);
        let addr = addr_str
            .parse()
            .map_err(|_| PrintError::InvalidConfig(format!("Invalid address: {}", addr_str)))?;

        Ok(Self {
            addr,
            timeout: Duration::from_secs(5),
        })
    }

    /// Set connection timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get the printer address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

#[async_trait]
impl Transport for NetworkTransport {
    #[instrument(skip(self, data), fields(addr = %self.addr, data_len = data.len()))]
    async fn send(&self, data: &[u8]) -> PrintResult<()> {
        info!("Connecting to printer");

        let mut stream = tokio::time::timeout(self.timeout, TcpStream::connect(self.addr))
            .await
            .map_err(|_| PrintError::Timeout(format!("Connection timeout: {}", self.addr)))?
            .map_err(|e| PrintError::Connection(format!("{}: {}", self.addr, e)))?;

        info!("Connected, sending {} bytes", data.len());

        tokio::time::timeout(self.timeout, async {
            stream.write_all(data).await?;
            stream.flush().await?;
            stream.shutdown().await
        })
        .await
        .map_err(|_| PrintError::Timeout(format!("Write timeout: {}", self.addr)))?
        .map_err(PrintError::Io)?;

        info!("Print data sent");
        Ok(())
    }

    #[instrument(skip(self), fields(addr = %self.addr))]
    async fn probe(&self) -> PrintResult<()> {
        match tokio::time::timeout(self.timeout, TcpStream::connect(self.addr)).await {
            Ok(Ok(_)) => {
                info!("Printer online");
                Ok(())
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Printer offline");
                Err(PrintError::Connection(format!("{}: {}", self.addr, e)))
            }
            Err(_) => {
                warn!("Printer probe timeout");
                Err(PrintError::Timeout(format!(
                    "Probe timeout: {}",
                    self.addr
                )))
            }
        }
    }
}

/// USB printer, addressed by its character device path (e.g. `/dev/usb/lp0`)
#[derive(Debug, Clone)]
pub struct UsbTransport {
    device: PathBuf,
    timeout: Duration,
}

impl UsbTransport {
    /// Create a transport writing to the given device path
    pub fn new(device: impl Into<PathBuf>) -> Self {
        Self {
            device: device.into(),
            timeout: Duration::from_secs(5),
        }
    }

    /// Set write timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get the device path
    pub fn device(&self) -> &Path {
        &self.device
    }
}

/// Write `data` to a device node, bounded by `timeout`
async fn write_device(device: &Path, data: &[u8], timeout: Duration) -> PrintResult<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .open(device)
        .await
        .map_err(|e| PrintError::Offline(format!("{}: {}", device.display(), e)))?;

    tokio::time::timeout(timeout, async {
        file.write_all(data).await?;
        file.flush().await
    })
    .await
    .map_err(|_| PrintError::Timeout(format!("Write timeout: {}", device.display())))?
    .map_err(PrintError::Io)?;

    Ok(())
}

/// Check a device node is present and is not a directory
async fn probe_device(device: &Path) -> PrintResult<()> {
    let meta = tokio::fs::metadata(device)
        .await
        .map_err(|e| PrintError::Offline(format!("{}: {}", device.display(), e)))?;

    if meta.is_dir() {
        return Err(PrintError::InvalidConfig(format!(
            "Not a device: {}",
            device.display()
        )));
    }
    Ok(())
}

#[async_trait]
impl Transport for UsbTransport {
    #[instrument(skip(self, data), fields(device = %self.device.display(), data_len = data.len()))]
    async fn send(&self, data: &[u8]) -> PrintResult<()> {
        write_device(&self.device, data, self.timeout).await?;
        info!("Print data written to USB device");
        Ok(())
    }

    #[instrument(skip(self), fields(device = %self.device.display()))]
    async fn probe(&self) -> PrintResult<()> {
        probe_device(&self.device).await
    }
}

/// Bluetooth printer over a pre-paired RFCOMM serial link
///
/// Pairing and channel binding happen outside this library (`rfcomm bind`);
/// once bound, the printer is a serial device node and delivery is a plain
/// device write, identical to USB.
#[derive(Debug, Clone)]
pub struct BluetoothTransport {
    device: PathBuf,
    timeout: Duration,
}

impl BluetoothTransport {
    /// Transport over the default RFCOMM device
    pub fn new() -> Self {
        Self::with_device(DEFAULT_RFCOMM_DEVICE)
    }

    /// Transport over a specific RFCOMM device node
    pub fn with_device(device: impl Into<PathBuf>) -> Self {
        Self {
            device: device.into(),
            timeout: Duration::from_secs(5),
        }
    }

    /// Set write timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for BluetoothTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for BluetoothTransport {
    #[instrument(skip(self, data), fields(device = %self.device.display(), data_len = data.len()))]
    async fn send(&self, data: &[u8]) -> PrintResult<()> {
        write_device(&self.device, data, self.timeout).await?;
        info!("Print data written to Bluetooth link");
        Ok(())
    }

    #[instrument(skip(self), fields(device = %self.device.display()))]
    async fn probe(&self) -> PrintResult<()> {
        probe_device(&self.device).await
    }
}
