//! Order domain events

use serde::{Deserialize, Serialize};
use shared::OrderStatus;

/// Emitted on every successful status transition (and on order placement,
/// where `old_status` is `None`). Consumed by the fulfillment coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderStatusChanged {
    pub order_id: String,
    pub restaurant_id: String,
    pub old_status: Option<OrderStatus>,
    pub new_status: OrderStatus,
}
