//! Printer API module: configuration, probes, print queue

mod handler;

use axum::{
    routing::{get, post},
    Router,
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/printers", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route(
            "/restaurants/{restaurant_id}/printers",
            get(handler::list).post(handler::create),
        )
        .route(
            "/restaurants/{restaurant_id}/printers/{printer_id}",
            axum::routing::put(handler::update).delete(handler::delete),
        )
        .route(
            "/restaurants/{restaurant_id}/printers/{printer_id}/test",
            post(handler::test_connection),
        )
        .route("/orders/{order_id}/print", post(handler::print_order))
        .route("/print-queue/{restaurant_id}", get(handler::list_queue))
        .route(
            "/print-queue/{restaurant_id}/{job_id}/retry",
            post(handler::retry_job),
        )
}
