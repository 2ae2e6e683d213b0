pub mod auth;
pub mod config;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod indexer;
pub mod models;
pub mod quota;
pub mod routes;
pub mod scheduler;
pub mod sitemap;
pub mod state;
pub mod worker;

use std::sync::Arc;

use axum::Router;
use sqlx::PgPool;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::indexer::IndexingClient;
use crate::state::{AppState, SharedState};

pub fn build_app(pool: PgPool, config: Config) -> Result<(Router, SharedState), String> {
    let indexer = IndexingClient::from_config(&config)?;
    if indexer.is_none() {
        tracing::warn!("No indexing credential configured; dispatch is disabled");
    }

    let state: SharedState = Arc::new(AppState {
        pool,
        config,
        indexer,
    });

    let app = Router::new()
        .merge(routes::api_routes())
        .route("/health", axum::routing::get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    Ok((app, state))
}

async fn health() -> &'static str {
    "ok"
}
