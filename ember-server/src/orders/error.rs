//! Order machine errors

use crate::db::StorageError;
use crate::utils::AppError;
use shared::OrderStatus;
use thiserror::Error;

/// Errors surfaced by the order status machine
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Order not found: {0}")]
    NotFound(String),

    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Permission denied: {0}")]
    Forbidden(String),

    #[error("Validation failed: {0}")]
    Validation(String),
}

pub type OrderResult<T> = Result<T, OrderError>;

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::Storage(e) => AppError::Storage(e.to_string()),
            OrderError::NotFound(id) => AppError::NotFound(format!("Order {id} not found")),
            OrderError::InvalidTransition { from, to } => {
                AppError::InvalidTransition(format!("{from} -> {to}"))
            }
            OrderError::Forbidden(msg) => AppError::Forbidden(msg),
            OrderError::Validation(msg) => AppError::Validation(msg),
        }
    }
}
