//! Axum router — maps all URL paths to handlers.

use axum::{
    extract::DefaultBodyLimit,
    routing::get,
    Router,
};
use tower_http::{
    services::ServeDir,
    trace::TraceLayer,
    compression::CompressionLayer,
};
use std::sync::Arc;
use crate::state::{AppState, SharedState};
use crate::handlers::{
    upload::{upload_page, upload_submit},
    setup::{setup_page, setup_submit},
    results::{results_page, results_download, drift_page, drift_download},
    api::{api_results, health},
};
use crate::sse::live_handler;

/// Build and return the full Axum router.
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.body_limit();
    let static_dir = state.static_dir.clone();
    let shared: SharedState = Arc::new(state);

    Router::new()
        // Pages
        .route("/",                 get(upload_page).post(upload_submit))
        .route("/setup-experiment", get(setup_page).post(setup_submit))
        .route("/results/{id}",     get(results_page))
        .route("/results/{id}/download",         get(results_download))
        .route("/results/{id}/{drift}",          get(drift_page))
        .route("/results/{id}/{drift}/download", get(drift_download))

        // SSE streaming
        .route("/live", get(live_handler))

        // API endpoints
        .route("/api/results/{id}", get(api_results))
        .route("/health",           get(health))

        // Static files
        .nest_service("/static", ServeDir::new(static_dir))

        // Middleware
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}
