use std::sync::Arc;

use axum::{extract::DefaultBodyLimit, routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::AppState;

pub mod reports;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health_check))
}

/// Full application router with every route, shared state and middleware.
pub fn app(state: Arc<AppState>) -> Router {
    let body_limit = state.config.max_file_size;
    Router::new()
        .merge(routes())
        .merge(reports::routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
