//! API route modules
//!
//! # Structure
//!
//! - [`orders`] - order placement and status transitions
//! - [`printers`] - printer CRUD, connection tests, print queue

pub mod orders;
pub mod printers;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::core::ServerState;

/// Build a router with all routes registered
pub fn build_router() -> Router<ServerState> {
    Router::new()
        .merge(orders::router())
        .merge(printers::router())
}

/// Build the fully configured application
pub fn build_app(state: ServerState) -> Router {
    build_router()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
