//! Router definition

use super::{handlers, AppState};
use axum::{extract::DefaultBodyLimit, routing::*, Router};
use tower_http::cors::CorsLayer;

/// Build the router for status and document delivery endpoints.
pub fn create_router(state: &AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/status", get(handlers::status))
        .route("/send-society", post(handlers::send_society))
        .layer(DefaultBodyLimit::max(state.body_limit))
        .layer(CorsLayer::permissive())
        .with_state(state.clone())
}
