//! OrderStatusMachine - guarded order status transitions
//!
//! All order mutation goes through this machine:
//!
//! ```text
//! update_status(principal, order_id, new_status)
//!     ├─ 1. Load order (NotFound)
//!     ├─ 2. Transition legality against current status (InvalidTransition)
//!     ├─ 3. Caller authorization (Forbidden)
//!     ├─ 4. Persist under the write guard
//!     └─ 5. Broadcast OrderStatusChanged
//! ```
//!
//! The write guard serializes the read-validate-write section per machine,
//! so of two racing conflicting writers the second one re-reads the updated
//! status and fails `InvalidTransition` instead of clobbering.

use parking_lot::Mutex;
use rust_decimal::Decimal;
use shared::util::new_id;
use shared::{
    models::order::{BulkStatusUpdate, StatusUpdate},
    BulkStatusResult, Order, OrderCreate, OrderStatus, Orderer,
};
use std::sync::Arc;
use tokio::sync::broadcast;

use super::{OrderError, OrderResult, OrderStatusChanged};
use crate::auth::Principal;
use crate::db::Storage;
use crate::utils::Clock;

/// Event broadcast channel capacity
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Order status machine
pub struct OrderStatusMachine {
    storage: Storage,
    event_tx: broadcast::Sender<OrderStatusChanged>,
    clock: Arc<dyn Clock>,
    /// Serializes read-validate-write; see module docs
    write_guard: Mutex<()>,
}

impl OrderStatusMachine {
    pub fn new(storage: Storage, clock: Arc<dyn Clock>) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            storage,
            event_tx,
            clock,
            write_guard: Mutex::new(()),
        }
    }

    /// Subscribe to status-change events
    pub fn subscribe(&self) -> broadcast::Receiver<OrderStatusChanged> {
        self.event_tx.subscribe()
    }

    /// Place a new order
    ///
    /// Validates the payload, computes the total from the items, stores the
    /// order as `received` and broadcasts the placement event.
    pub fn create_order(&self, payload: OrderCreate) -> OrderResult<Order> {
        validate_create(&payload)?;

        let now = self.clock.now_millis();
        let order = Order {
            id: new_id(),
            restaurant_id: payload.restaurant_id,
            orderer: payload.orderer,
            total_price: Order::total_of(&payload.items),
            items: payload.items,
            status: OrderStatus::Received,
            notes: payload.notes,
            estimated_ready_time: None,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
        };
        self.storage.store_order(&order)?;

        tracing::info!(
            order_id = %order.id,
            restaurant_id = %order.restaurant_id,
            total = %order.total_price,
            "Order placed"
        );
        self.emit(&order, None);
        Ok(order)
    }

    /// Fetch an order
    pub fn get_order(&self, order_id: &str) -> OrderResult<Order> {
        self.storage
            .get_order(order_id)?
            .ok_or_else(|| OrderError::NotFound(order_id.to_string()))
    }

    /// List a restaurant's orders, most recent first
    pub fn list_orders(&self, restaurant_id: &str) -> OrderResult<Vec<Order>> {
        Ok(self.storage.list_orders(restaurant_id)?)
    }

    /// Apply a single status transition
    pub fn update_status(
        &self,
        principal: &Principal,
        order_id: &str,
        update: &StatusUpdate,
    ) -> OrderResult<Order> {
        let (order, old_status) = {
            let _guard = self.write_guard.lock();

            let mut order = self
                .storage
                .get_order(order_id)?
                .ok_or_else(|| OrderError::NotFound(order_id.to_string()))?;

            // Transition legality comes first: an illegal transition is
            // rejected identically for every caller.
            if !order.status.can_transition_to(update.status) {
                return Err(OrderError::InvalidTransition {
                    from: order.status,
                    to: update.status,
                });
            }

            authorize(principal, &order, update.status)?;

            if update.status == OrderStatus::Cancelled {
                let reason = update.reason.as_deref().unwrap_or("").trim();
                if reason.is_empty() {
                    return Err(OrderError::Validation(
                        "cancellation reason must not be empty".to_string(),
                    ));
                }
                order.cancellation_reason = Some(reason.to_string());
            }

            let old_status = order.status;
            order.status = update.status;
            if let Some(eta) = &update.estimated_ready_time {
                order.estimated_ready_time = Some(eta.clone());
            }
            order.updated_at = self.clock.now_millis();
            self.storage.store_order(&order)?;
            (order, old_status)
        };

        tracing::info!(
            order_id = %order.id,
            from = %old_status,
            to = %order.status,
            "Order status updated"
        );
        self.emit(&order, Some(old_status));
        Ok(order)
    }

    /// Apply a transition to many orders independently
    ///
    /// A failure on one order (wrong current state, missing, forbidden)
    /// leaves that order untouched, lands its id in `failed`, and never
    /// aborts the batch: bulk actions race other actors by design.
    pub fn bulk_update_status(
        &self,
        principal: &Principal,
        update: &BulkStatusUpdate,
    ) -> OrderResult<BulkStatusResult> {
        let single = StatusUpdate {
            status: update.status,
            estimated_ready_time: update.estimated_ready_time.clone(),
            reason: update.reason.clone(),
        };

        let mut result = BulkStatusResult {
            updated: Vec::new(),
            failed: Vec::new(),
        };

        for order_id in &update.order_ids {
            match self.update_status(principal, order_id, &single) {
                Ok(order) => result.updated.push(order),
                Err(OrderError::Storage(e)) => return Err(OrderError::Storage(e)),
                Err(e) => {
                    tracing::warn!(order_id = %order_id, error = %e, "Bulk update entry failed");
                    result.failed.push(order_id.clone());
                }
            }
        }

        Ok(result)
    }

    /// Cancel an order: sugar for a transition to `cancelled`
    pub fn cancel(&self, principal: &Principal, order_id: &str, reason: &str) -> OrderResult<Order> {
        if reason.trim().is_empty() {
            return Err(OrderError::Validation(
                "cancellation reason must not be empty".to_string(),
            ));
        }
        self.update_status(
            principal,
            order_id,
            &StatusUpdate {
                status: OrderStatus::Cancelled,
                estimated_ready_time: None,
                reason: Some(reason.to_string()),
            },
        )
    }

    fn emit(&self, order: &Order, old_status: Option<OrderStatus>) {
        // Nobody listening is fine (e.g. unit tests without a coordinator)
        let _ = self.event_tx.send(OrderStatusChanged {
            order_id: order.id.clone(),
            restaurant_id: order.restaurant_id.clone(),
            old_status,
            new_status: order.status,
        });
    }
}

/// Authorization rules for a transition
///
/// Staff of the owning restaurant may apply any legal transition.
/// Cancellation only: the matching customer, or a guest whose email AND
/// phone both match the order's guest info.
fn authorize(principal: &Principal, order: &Order, target: OrderStatus) -> OrderResult<()> {
    if principal.is_staff_of(&order.restaurant_id) {
        return Ok(());
    }

    if target == OrderStatus::Cancelled {
        match (principal, &order.orderer) {
            (Principal::Customer { id }, Orderer::Customer { customer_id })
                if id == customer_id =>
            {
                return Ok(());
            }
            (Principal::Guest { email, phone }, Orderer::Guest { guest_info })
                if *email == guest_info.email && *phone == guest_info.phone =>
            {
                return Ok(());
            }
            _ => {}
        }
    }

    Err(OrderError::Forbidden(
        "not allowed to modify this order".to_string(),
    ))
}

fn validate_create(payload: &OrderCreate) -> OrderResult<()> {
    if payload.restaurant_id.trim().is_empty() {
        return Err(OrderError::Validation(
            "restaurant_id must not be empty".to_string(),
        ));
    }
    if payload.items.is_empty() {
        return Err(OrderError::Validation(
            "order must contain at least one item".to_string(),
        ));
    }
    for item in &payload.items {
        if item.name.trim().is_empty() {
            return Err(OrderError::Validation(
                "item name must not be empty".to_string(),
            ));
        }
        if item.price < Decimal::ZERO {
            return Err(OrderError::Validation(format!(
                "item {} has a negative price",
                item.name
            )));
        }
        if item.quantity == 0 {
            return Err(OrderError::Validation(format!(
                "item {} has zero quantity",
                item.name
            )));
        }
    }
    if let Orderer::Guest { guest_info } = &payload.orderer
        && (guest_info.email.trim().is_empty() || guest_info.phone.trim().is_empty())
    {
        return Err(OrderError::Validation(
            "guest orders require email and phone".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::clock::ManualClock;
    use shared::{GuestInfo, OrderItem};
    use std::str::FromStr;

    fn machine() -> OrderStatusMachine {
        let storage = Storage::open_in_memory().unwrap();
        OrderStatusMachine::new(storage, ManualClock::new(1_000))
    }

    fn staff() -> Principal {
        Principal::Staff {
            id: "emp-1".to_string(),
            restaurant_id: "r-1".to_string(),
        }
    }

    fn item(name: &str, price: &str, quantity: u32) -> OrderItem {
        OrderItem {
            name: name.to_string(),
            price: Decimal::from_str(price).unwrap(),
            quantity,
            modifications: vec![],
        }
    }

    fn place_order(m: &OrderStatusMachine) -> Order {
        m.create_order(OrderCreate {
            restaurant_id: "r-1".to_string(),
            orderer: Orderer::Customer {
                customer_id: "cust-1".to_string(),
            },
            items: vec![item("Burger", "15.99", 1), item("Fries", "8.99", 2)],
            notes: None,
        })
        .unwrap()
    }

    fn set_status(m: &OrderStatusMachine, order_id: &str, status: OrderStatus) -> Order {
        m.update_status(
            &staff(),
            order_id,
            &StatusUpdate {
                status,
                estimated_ready_time: None,
                reason: Some("test".to_string()),
            },
        )
        .unwrap()
    }

    #[test]
    fn create_computes_total_and_starts_received() {
        let m = machine();
        let order = place_order(&m);
        assert_eq!(order.total_price, Decimal::from_str("33.97").unwrap());
        assert_eq!(order.status, OrderStatus::Received);
    }

    #[test]
    fn create_rejects_bad_items() {
        let m = machine();
        let err = m
            .create_order(OrderCreate {
                restaurant_id: "r-1".to_string(),
                orderer: Orderer::Customer {
                    customer_id: "cust-1".to_string(),
                },
                items: vec![item("Burger", "15.99", 0)],
                notes: None,
            })
            .unwrap_err();
        assert!(matches!(err, OrderError::Validation(_)));
    }

    #[test]
    fn happy_path_transitions() {
        let m = machine();
        let order = place_order(&m);

        for status in [
            OrderStatus::Confirmed,
            OrderStatus::InKitchen,
            OrderStatus::ReadyForPickup,
            OrderStatus::Delivered,
        ] {
            let updated = set_status(&m, &order.id, status);
            assert_eq!(updated.status, status);
        }
    }

    #[test]
    fn skip_and_reverse_transitions_rejected() {
        let m = machine();
        let order = place_order(&m);

        let err = m
            .update_status(
                &staff(),
                &order.id,
                &StatusUpdate {
                    status: OrderStatus::Delivered,
                    estimated_ready_time: None,
                    reason: None,
                },
            )
            .unwrap_err();
        assert!(matches!(err, OrderError::InvalidTransition { .. }));

        set_status(&m, &order.id, OrderStatus::Confirmed);
        let err = m
            .update_status(
                &staff(),
                &order.id,
                &StatusUpdate {
                    status: OrderStatus::Received,
                    estimated_ready_time: None,
                    reason: None,
                },
            )
            .unwrap_err();
        assert!(matches!(err, OrderError::InvalidTransition { .. }));
    }

    #[test]
    fn cancel_window_closes_in_kitchen() {
        let m = machine();
        let order = place_order(&m);
        set_status(&m, &order.id, OrderStatus::Confirmed);
        set_status(&m, &order.id, OrderStatus::InKitchen);

        // Staff cannot cancel either once the kitchen has the order
        let err = m.cancel(&staff(), &order.id, "changed my mind").unwrap_err();
        assert!(matches!(err, OrderError::InvalidTransition { .. }));
    }

    #[test]
    fn cancel_requires_reason() {
        let m = machine();
        let order = place_order(&m);
        let err = m.cancel(&staff(), &order.id, "  ").unwrap_err();
        assert!(matches!(err, OrderError::Validation(_)));

        let cancelled = m.cancel(&staff(), &order.id, "out of stock").unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(cancelled.cancellation_reason.as_deref(), Some("out of stock"));
    }

    #[test]
    fn terminal_orders_reject_everything() {
        let m = machine();
        let order = place_order(&m);
        m.cancel(&staff(), &order.id, "dup").unwrap();

        let err = m
            .update_status(
                &staff(),
                &order.id,
                &StatusUpdate {
                    status: OrderStatus::Confirmed,
                    estimated_ready_time: None,
                    reason: None,
                },
            )
            .unwrap_err();
        assert!(matches!(err, OrderError::InvalidTransition { .. }));
    }

    #[test]
    fn missing_order_is_not_found() {
        let m = machine();
        let err = m
            .update_status(
                &staff(),
                "ghost",
                &StatusUpdate {
                    status: OrderStatus::Confirmed,
                    estimated_ready_time: None,
                    reason: None,
                },
            )
            .unwrap_err();
        assert!(matches!(err, OrderError::NotFound(_)));
    }

    #[test]
    fn foreign_staff_is_forbidden() {
        let m = machine();
        let order = place_order(&m);
        let other = Principal::Staff {
            id: "emp-9".to_string(),
            restaurant_id: "r-2".to_string(),
        };
        let err = m
            .update_status(
                &other,
                &order.id,
                &StatusUpdate {
                    status: OrderStatus::Confirmed,
                    estimated_ready_time: None,
                    reason: None,
                },
            )
            .unwrap_err();
        assert!(matches!(err, OrderError::Forbidden(_)));
    }

    #[test]
    fn customer_may_cancel_own_order_only() {
        let m = machine();
        let order = place_order(&m);

        let stranger = Principal::Customer {
            id: "cust-2".to_string(),
        };
        assert!(matches!(
            m.cancel(&stranger, &order.id, "nope").unwrap_err(),
            OrderError::Forbidden(_)
        ));

        let owner = Principal::Customer {
            id: "cust-1".to_string(),
        };
        assert!(m.cancel(&owner, &order.id, "too slow").is_ok());
    }

    #[test]
    fn customer_cannot_drive_fulfillment() {
        let m = machine();
        let order = place_order(&m);
        let owner = Principal::Customer {
            id: "cust-1".to_string(),
        };
        let err = m
            .update_status(
                &owner,
                &order.id,
                &StatusUpdate {
                    status: OrderStatus::Confirmed,
                    estimated_ready_time: None,
                    reason: None,
                },
            )
            .unwrap_err();
        assert!(matches!(err, OrderError::Forbidden(_)));
    }

    #[test]
    fn guest_cancellation_needs_both_email_and_phone() {
        let m = machine();
        let order = m
            .create_order(OrderCreate {
                restaurant_id: "r-1".to_string(),
                orderer: Orderer::Guest {
                    guest_info: GuestInfo {
                        name: "Ana".to_string(),
                        phone: "+34600111222".to_string(),
                        email: "ana@example.com".to_string(),
                    },
                },
                items: vec![item("Salad", "9.50", 1)],
                notes: None,
            })
            .unwrap();

        let phone_only = Principal::Guest {
            email: "other@example.com".to_string(),
            phone: "+34600111222".to_string(),
        };
        assert!(matches!(
            m.cancel(&phone_only, &order.id, "mistake").unwrap_err(),
            OrderError::Forbidden(_)
        ));

        let both = Principal::Guest {
            email: "ana@example.com".to_string(),
            phone: "+34600111222".to_string(),
        };
        assert!(m.cancel(&both, &order.id, "mistake").is_ok());
    }

    #[test]
    fn bulk_update_is_partial() {
        let m = machine();
        let a = place_order(&m);
        let b = place_order(&m);
        let c = place_order(&m);
        // Drive C to delivered so it is ineligible for `confirmed`
        for status in [
            OrderStatus::Confirmed,
            OrderStatus::InKitchen,
            OrderStatus::ReadyForPickup,
            OrderStatus::Delivered,
        ] {
            set_status(&m, &c.id, status);
        }

        let result = m
            .bulk_update_status(
                &staff(),
                &BulkStatusUpdate {
                    order_ids: vec![a.id.clone(), b.id.clone(), c.id.clone()],
                    status: OrderStatus::Confirmed,
                    estimated_ready_time: None,
                    reason: None,
                },
            )
            .unwrap();

        let updated_ids: Vec<_> = result.updated.iter().map(|o| o.id.clone()).collect();
        assert_eq!(updated_ids, vec![a.id.clone(), b.id.clone()]);
        assert_eq!(result.failed, vec![c.id.clone()]);

        // No side effect on the failed entry
        assert_eq!(m.get_order(&c.id).unwrap().status, OrderStatus::Delivered);
    }

    #[test]
    fn bulk_update_missing_ids_fail_soft() {
        let m = machine();
        let a = place_order(&m);

        let result = m
            .bulk_update_status(
                &staff(),
                &BulkStatusUpdate {
                    order_ids: vec![a.id.clone(), "ghost".to_string()],
                    status: OrderStatus::Confirmed,
                    estimated_ready_time: None,
                    reason: None,
                },
            )
            .unwrap();
        assert_eq!(result.updated.len(), 1);
        assert_eq!(result.failed, vec!["ghost".to_string()]);
    }

    #[test]
    fn events_are_broadcast() {
        let m = machine();
        let mut rx = m.subscribe();

        let order = place_order(&m);
        let ev = rx.try_recv().unwrap();
        assert_eq!(ev.order_id, order.id);
        assert_eq!(ev.old_status, None);
        assert_eq!(ev.new_status, OrderStatus::Received);

        set_status(&m, &order.id, OrderStatus::Confirmed);
        let ev = rx.try_recv().unwrap();
        assert_eq!(ev.old_status, Some(OrderStatus::Received));
        assert_eq!(ev.new_status, OrderStatus::Confirmed);
    }

    #[test]
    fn estimated_ready_time_is_persisted() {
        let m = machine();
        let order = place_order(&m);
        let updated = m
            .update_status(
                &staff(),
                &order.id,
                &StatusUpdate {
                    status: OrderStatus::Confirmed,
                    estimated_ready_time: Some("18:45".to_string()),
                    reason: None,
                },
            )
            .unwrap();
        assert_eq!(updated.estimated_ready_time.as_deref(), Some("18:45"));
    }
}
