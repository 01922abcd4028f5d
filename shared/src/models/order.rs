//! Order Model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order status lifecycle
///
/// The happy path is linear:
/// `received → confirmed → in_kitchen → ready_for_pickup → delivered`.
/// Cancellation is only reachable from `received` or `confirmed`.
/// `delivered` and `cancelled` are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Received,
    Confirmed,
    InKitchen,
    ReadyForPickup,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Whether a transition from `self` to `next` is legal
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Received, Confirmed)
                | (Confirmed, InKitchen)
                | (InKitchen, ReadyForPickup)
                | (ReadyForPickup, Delivered)
                | (Received, Cancelled)
                | (Confirmed, Cancelled)
        )
    }

    /// Terminal statuses admit no further transitions
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Whether an order in this status may still be cancelled
    pub fn is_cancellable(self) -> bool {
        self.can_transition_to(OrderStatus::Cancelled)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderStatus::Received => "received",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::InKitchen => "in_kitchen",
            OrderStatus::ReadyForPickup => "ready_for_pickup",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Contact details identifying a guest order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GuestInfo {
    pub name: String,
    pub phone: String,
    pub email: String,
}

/// Who placed the order: a registered customer XOR a guest
///
/// Serialized flat, so an order document carries either `customer_id` or
/// `guest_info` but never both.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Orderer {
    Customer { customer_id: String },
    Guest { guest_info: GuestInfo },
}

/// A single order line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub name: String,
    /// Unit price in currency units, non-negative
    pub price: Decimal,
    /// Positive quantity
    pub quantity: u32,
    #[serde(default)]
    pub modifications: Vec<String>,
}

impl OrderItem {
    /// Price × quantity for this line
    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

/// Order entity
///
/// Created once at placement, then mutated exclusively through the status
/// machine. Orders are never deleted; they end in a terminal status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub restaurant_id: String,
    #[serde(flatten)]
    pub orderer: Orderer,
    pub items: Vec<OrderItem>,
    pub total_price: Decimal,
    pub status: OrderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_ready_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,
    /// Unix millis
    pub created_at: i64,
    /// Unix millis
    pub updated_at: i64,
}

impl Order {
    /// Sum of `price × quantity` over all items
    pub fn total_of(items: &[OrderItem]) -> Decimal {
        items.iter().map(OrderItem::line_total).sum()
    }
}

/// Create order payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCreate {
    pub restaurant_id: String,
    #[serde(flatten)]
    pub orderer: Orderer,
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Single status transition payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: OrderStatus,
    #[serde(default)]
    pub estimated_ready_time: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Bulk status transition payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkStatusUpdate {
    pub order_ids: Vec<String>,
    pub status: OrderStatus,
    #[serde(default)]
    pub estimated_ready_time: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Bulk transition outcome: partial failure is data, not an error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkStatusResult {
    pub updated: Vec<Order>,
    pub failed: Vec<String>,
}

/// Cancellation payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelRequest {
    pub reason: String,
}
