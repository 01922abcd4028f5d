//! Printer API handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use shared::{
    PrintJob, PrintRequest, Printer, PrinterCreate, PrinterUpdate, TestConnectionReport,
};

use crate::auth::Principal;
use crate::core::ServerState;
use crate::utils::{AppError, AppResult};

fn require_staff(principal: &Principal, restaurant_id: &str) -> AppResult<()> {
    if principal.is_staff_of(restaurant_id) {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "restaurant staff access required".to_string(),
        ))
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct ListFilter {
    #[serde(default)]
    pub enabled_only: bool,
}

/// GET /api/printers/restaurants/{restaurant_id}/printers - list printers
pub async fn list(
    State(state): State<ServerState>,
    principal: Principal,
    Path(restaurant_id): Path<String>,
    Query(filter): Query<ListFilter>,
) -> AppResult<Json<Vec<Printer>>> {
    require_staff(&principal, &restaurant_id)?;
    let printers = state.registry.list(&restaurant_id, filter.enabled_only)?;
    Ok(Json(printers))
}

/// POST /api/printers/restaurants/{restaurant_id}/printers - register a printer
pub async fn create(
    State(state): State<ServerState>,
    principal: Principal,
    Path(restaurant_id): Path<String>,
    Json(payload): Json<PrinterCreate>,
) -> AppResult<Json<Printer>> {
    require_staff(&principal, &restaurant_id)?;
    let printer = state.registry.create(&restaurant_id, payload)?;
    state.dispatcher.ensure_worker(&printer.id);
    Ok(Json(printer))
}

/// PUT /api/printers/restaurants/{restaurant_id}/printers/{printer_id} - update
pub async fn update(
    State(state): State<ServerState>,
    principal: Principal,
    Path((restaurant_id, printer_id)): Path<(String, String)>,
    Json(payload): Json<PrinterUpdate>,
) -> AppResult<Json<Printer>> {
    require_staff(&principal, &restaurant_id)?;
    let printer = state.registry.update(&restaurant_id, &printer_id, payload)?;
    // Worker lifecycle follows the enabled flag
    state.dispatcher.ensure_worker(&printer.id);
    Ok(Json(printer))
}

/// DELETE /api/printers/restaurants/{restaurant_id}/printers/{printer_id}
pub async fn delete(
    State(state): State<ServerState>,
    principal: Principal,
    Path((restaurant_id, printer_id)): Path<(String, String)>,
) -> AppResult<Json<bool>> {
    require_staff(&principal, &restaurant_id)?;
    state.registry.delete(&restaurant_id, &printer_id)?;
    state.dispatcher.stop_worker(&printer_id);
    Ok(Json(true))
}

/// POST /api/printers/restaurants/{restaurant_id}/printers/{printer_id}/test
pub async fn test_connection(
    State(state): State<ServerState>,
    principal: Principal,
    Path((restaurant_id, printer_id)): Path<(String, String)>,
) -> AppResult<Json<TestConnectionReport>> {
    require_staff(&principal, &restaurant_id)?;
    let report = state
        .registry
        .test_connection(&restaurant_id, &printer_id)
        .await?;
    Ok(Json(report))
}

/// POST /api/printers/orders/{order_id}/print - explicit print request
pub async fn print_order(
    State(state): State<ServerState>,
    principal: Principal,
    Path(order_id): Path<String>,
    Json(payload): Json<PrintRequest>,
) -> AppResult<Json<PrintJob>> {
    let order = state.machine.get_order(&order_id)?;
    require_staff(&principal, &order.restaurant_id)?;
    let job = state
        .coordinator
        .print_order(&order_id, &payload.printer_id, payload.print_type)?;
    Ok(Json(job))
}

/// GET /api/printers/print-queue/{restaurant_id} - list print jobs
pub async fn list_queue(
    State(state): State<ServerState>,
    principal: Principal,
    Path(restaurant_id): Path<String>,
) -> AppResult<Json<Vec<PrintJob>>> {
    require_staff(&principal, &restaurant_id)?;
    let jobs = state.queue.list_queue(&restaurant_id)?;
    Ok(Json(jobs))
}

/// POST /api/printers/print-queue/{restaurant_id}/{job_id}/retry - manual retry
pub async fn retry_job(
    State(state): State<ServerState>,
    principal: Principal,
    Path((restaurant_id, job_id)): Path<(String, String)>,
) -> AppResult<Json<PrintJob>> {
    require_staff(&principal, &restaurant_id)?;
    let job = state.queue.get(&job_id)?;
    if job.restaurant_id != restaurant_id {
        return Err(AppError::NotFound(format!("Print job {job_id} not found")));
    }
    let job = state.queue.retry(&job_id)?;
    state.dispatcher.notify(&job.printer_id);
    Ok(Json(job))
}
