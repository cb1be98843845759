//! JSON read API and health check.

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::state::SharedState;

/// `{experiment, results}` for one experiment.
pub async fn api_results(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let (experiment, results) = tokio::try_join!(
        state.coordinator.get_experiment(&id),
        state.coordinator.get_status(&id),
    )?;
    Ok(Json(json!({ "experiment": experiment, "results": results })))
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "dynamik",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
