//! Print Job Model

use serde::{Deserialize, Serialize};

use super::printer::PrinterKind;

/// Delivery attempts allowed before a job settles as failed
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// What gets rendered for the job
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PrintType {
    KitchenTicket,
    Receipt,
    Label,
}

/// The ticket a printer of the given kind receives
pub fn print_type_for(kind: PrinterKind) -> PrintType {
    match kind {
        PrinterKind::Kitchen => PrintType::KitchenTicket,
        PrinterKind::Receipt => PrintType::Receipt,
        PrinterKind::Label => PrintType::Label,
    }
}

/// Print job state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PrintJobStatus {
    Queued,
    Printing,
    Completed,
    Failed,
}

/// A unit of print work: "send this order's rendered content to this printer"
///
/// Jobs are created by the fulfillment coordinator or an explicit print
/// request, mutated only by the dispatcher/queue, and never deleted —
/// exhausted failures stay visible for manual retry and audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrintJob {
    pub id: String,
    pub order_id: String,
    pub printer_id: String,
    pub restaurant_id: String,
    pub print_type: PrintType,
    pub status: PrintJobStatus,
    /// Delivery attempts made so far
    pub attempts: u32,
    pub max_attempts: u32,
    /// Unix millis
    pub created_at: i64,
    /// Set only on terminal success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
    /// Last failure reason, present only when failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Backoff gate: the job is not eligible for dequeue before this instant
    #[serde(default)]
    pub not_before: i64,
    /// When the job was last claimed for printing (recovery sweep input)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<i64>,
}

impl PrintJob {
    /// Whether the job may be handed to a dispatcher worker at `now`
    pub fn is_eligible(&self, now: i64) -> bool {
        self.status == PrintJobStatus::Queued && self.not_before <= now
    }
}

/// Explicit "print this order" request payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrintRequest {
    pub printer_id: String,
    pub print_type: PrintType,
}
