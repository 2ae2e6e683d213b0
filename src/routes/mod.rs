pub mod queue;

use axum::Router;
use axum::routing::{delete, get, post};

use crate::state::SharedState;

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        .route("/api/v1/queue", post(queue::add_to_queue))
        .route("/api/v1/queue/schedule-fresh", post(queue::schedule_fresh))
        .route("/api/v1/queue/seed-sitemap", post(queue::seed_sitemap))
        .route("/api/v1/queue/process", post(queue::process))
        .route("/api/v1/queue/stats", get(queue::stats))
        .route("/api/v1/queue/items", get(queue::items))
        .route("/api/v1/queue/items/{id}", delete(queue::delete_item))
}
