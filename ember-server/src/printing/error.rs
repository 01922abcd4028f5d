//! Printing subsystem errors

use crate::db::StorageError;
use crate::utils::AppError;
use thiserror::Error;

/// Errors surfaced by the registry, queue and dispatcher
#[derive(Debug, Error)]
pub enum PrintingError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Printer not found: {0}")]
    PrinterNotFound(String),

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Print job not found: {0}")]
    JobNotFound(String),

    #[error("Printer is disabled: {0}")]
    PrinterDisabled(String),

    #[error("Invalid job state: {0}")]
    InvalidState(String),

    #[error("Validation failed: {0}")]
    Validation(String),
}

pub type PrintingResult<T> = Result<T, PrintingError>;

impl PrintingError {
    /// Build a `Validation` error enumerating every violation
    pub fn violations(messages: Vec<String>) -> Self {
        PrintingError::Validation(messages.join("; "))
    }
}

impl From<PrintingError> for AppError {
    fn from(err: PrintingError) -> Self {
        match err {
            PrintingError::Storage(e) => AppError::Storage(e.to_string()),
            PrintingError::PrinterNotFound(id) => {
                AppError::NotFound(format!("Printer {id} not found"))
            }
            PrintingError::OrderNotFound(id) => AppError::NotFound(format!("Order {id} not found")),
            PrintingError::JobNotFound(id) => {
                AppError::NotFound(format!("Print job {id} not found"))
            }
            PrintingError::PrinterDisabled(id) => {
                AppError::Conflict(format!("Printer {id} is disabled"))
            }
            PrintingError::InvalidState(msg) => AppError::InvalidState(msg),
            PrintingError::Validation(msg) => AppError::Validation(msg),
        }
    }
}
