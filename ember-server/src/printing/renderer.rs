//! Ticket and receipt rendering
//!
//! Turns an order into the ESC/POS payload for a given print type. The
//! dispatcher treats the renderer as an opaque collaborator; swapping in a
//! template engine later only touches this seam.

use ember_printer::EscPosBuilder;
use shared::{Order, OrderItem, Orderer, PrintType};

/// Renders the byte payload for a print job
pub trait TicketRenderer: Send + Sync {
    fn render(&self, order: &Order, print_type: PrintType) -> Vec<u8>;
}

/// ESC/POS renderer for thermal printers
///
/// Kitchen tickets carry what the kitchen needs (items, modifications,
/// notes, big type); receipts carry the price breakdown.
pub struct EscPosTicketRenderer {
    width: usize,
}

impl EscPosTicketRenderer {
    /// Create a renderer for the given paper width in characters
    ///
    /// Common widths:
    /// - 58mm paper: 32 characters
    /// - 80mm paper: 48 characters
    pub fn new(width: usize) -> Self {
        Self { width }
    }

    fn kitchen_ticket(&self, order: &Order) -> Vec<u8> {
        let mut b = EscPosBuilder::new(self.width);

        b.center();
        b.double_size();
        b.bold();
        b.line("KITCHEN");
        b.bold_off();
        b.reset_size();
        b.line(&format!("Order {}", short_id(&order.id)));
        b.line(&format_timestamp(order.created_at));
        b.left();
        b.sep_double();

        for item in &order.items {
            b.double_height();
            b.line(&format!("{} x {}", item.quantity, item.name));
            b.reset_size();
            for modification in &item.modifications {
                b.line(&format!("   - {modification}"));
            }
        }

        if let Some(notes) = &order.notes
            && !notes.is_empty()
        {
            b.sep_single();
            b.bold();
            b.line(&format!("* {notes}"));
            b.bold_off();
        }

        b.feed(3);
        b.cut();
        b.build()
    }

    fn receipt(&self, order: &Order) -> Vec<u8> {
        let mut b = EscPosBuilder::new(self.width);

        b.center();
        b.bold();
        b.line("RECEIPT");
        b.bold_off();
        b.line(&format!("Order {}", short_id(&order.id)));
        b.line(&format_timestamp(order.created_at));
        b.left();
        b.sep_double();

        for item in &order.items {
            b.line_lr(
                &format!("{} x{}", item.name, item.quantity),
                &money(item.line_total()),
            );
        }

        b.sep_single();
        b.bold();
        b.line_lr("TOTAL", &money(order.total_price));
        b.bold_off();

        if let Orderer::Guest { guest_info } = &order.orderer {
            b.newline();
            b.line(&format!("Guest: {}", guest_info.name));
        }

        b.newline();
        b.center();
        b.line("Thank you!");
        b.left();
        b.feed(3);
        b.cut();
        b.build()
    }

    fn label(&self, order: &Order) -> Vec<u8> {
        let mut b = EscPosBuilder::new(self.width);
        let total_lines: u32 = order.items.iter().map(|i: &OrderItem| i.quantity).sum();

        let mut index = 0;
        for item in &order.items {
            for _ in 0..item.quantity {
                index += 1;
                b.bold();
                b.line(&item.name);
                b.bold_off();
                b.line(&format!("{} [{}/{}]", short_id(&order.id), index, total_lines));
                b.newline();
            }
        }
        b.cut();
        b.build()
    }
}

impl TicketRenderer for EscPosTicketRenderer {
    fn render(&self, order: &Order, print_type: PrintType) -> Vec<u8> {
        match print_type {
            PrintType::KitchenTicket => self.kitchen_ticket(order),
            PrintType::Receipt => self.receipt(order),
            PrintType::Label => self.label(order),
        }
    }
}

impl Default for EscPosTicketRenderer {
    fn default() -> Self {
        Self::new(48)
    }
}

/// First 8 characters of an opaque id, enough for a paper reference
fn short_id(id: &str) -> String {
    id.chars().take(8).collect()
}

fn money(amount: rust_decimal::Decimal) -> String {
    format!("{}", amount.round_dp(2))
}

/// Unix millis to `MM-DD HH:MM:SS`
fn format_timestamp(ts: i64) -> String {
    match chrono::DateTime::from_timestamp_millis(ts) {
        Some(dt) => dt.format("%m-%d %H:%M:%S").to_string(),
        None => "--".to_string(),
    }
}
