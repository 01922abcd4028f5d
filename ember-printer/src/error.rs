//! Error types for the printer library

use thiserror::Error;

/// Printer error types
#[derive(Debug, Error)]
pub enum PrintError {
    /// Connection error (TCP connect refused, link down)
    #[error("Connection failed: {0}")]
    Connection(String),

    /// IO error during delivery
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Printer is offline or the device node is absent
    #[error("Printer offline: {0}")]
    Offline(String),

    /// Timeout waiting for the printer
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Invalid transport configuration
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

/// Result type for printer operations
pub type PrintResult<T> = Result<T, PrintError>;
