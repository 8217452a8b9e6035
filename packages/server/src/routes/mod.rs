use axum::{
    Router,
    routing::{get, post},
};

use crate::handlers;
use crate::state::AppState;

pub fn dlq_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::dlq::list_entries))
        .route("/stats", get(handlers::dlq::get_stats))
        .route("/retry-all", post(handlers::dlq::retry_all))
        .route("/{id}", get(handlers::dlq::get_entry))
        .route("/{id}/retry", post(handlers::dlq::retry_entry))
        .route("/{id}/discard", post(handlers::dlq::discard_entry))
}
