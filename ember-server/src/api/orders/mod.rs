//! Order API module

mod handler;

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/orders", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", post(handler::create))
        .route("/{id}", get(handler::get_by_id))
        .route("/{id}/status", patch(handler::update_status))
        .route("/bulk/status", patch(handler::bulk_update_status))
        .route("/{id}/cancel", post(handler::cancel))
}
