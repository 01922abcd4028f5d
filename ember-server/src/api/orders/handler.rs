//! Order API handlers

use axum::{
    extract::{Path, State},
    Json,
};
use shared::models::order::{BulkStatusUpdate, CancelRequest, StatusUpdate};
use shared::{BulkStatusResult, Order, OrderCreate};

use crate::auth::Principal;
use crate::core::ServerState;
use crate::utils::AppResult;

/// POST /api/orders - place an order
pub async fn create(
    State(state): State<ServerState>,
    _principal: Principal,
    Json(payload): Json<OrderCreate>,
) -> AppResult<Json<Order>> {
    let order = state.machine.create_order(payload)?;
    Ok(Json(order))
}

/// GET /api/orders/{id} - fetch an order
pub async fn get_by_id(
    State(state): State<ServerState>,
    _principal: Principal,
    Path(id): Path<String>,
) -> AppResult<Json<Order>> {
    let order = state.machine.get_order(&id)?;
    Ok(Json(order))
}

/// PATCH /api/orders/{id}/status - single status transition
pub async fn update_status(
    State(state): State<ServerState>,
    principal: Principal,
    Path(id): Path<String>,
    Json(payload): Json<StatusUpdate>,
) -> AppResult<Json<Order>> {
    let order = state.machine.update_status(&principal, &id, &payload)?;
    Ok(Json(order))
}

/// PATCH /api/orders/bulk/status - bulk transition, 200 with partial result
pub async fn bulk_update_status(
    State(state): State<ServerState>,
    principal: Principal,
    Json(payload): Json<BulkStatusUpdate>,
) -> AppResult<Json<BulkStatusResult>> {
    let result = state.machine.bulk_update_status(&principal, &payload)?;
    Ok(Json(result))
}

/// POST /api/orders/{id}/cancel - cancellation sugar
pub async fn cancel(
    State(state): State<ServerState>,
    principal: Principal,
    Path(id): Path<String>,
    Json(payload): Json<CancelRequest>,
) -> AppResult<Json<Order>> {
    let order = state.machine.cancel(&principal, &id, &payload.reason)?;
    Ok(Json(order))
}
