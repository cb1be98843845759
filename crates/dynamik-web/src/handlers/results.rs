//! Results pages and JSON downloads.

use axum::{
    extract::{Path, State},
    http::header,
    response::{Html, IntoResponse, Response},
};

use dynamik_common::DynamikError;

use crate::error::ApiError;
use crate::render;
use crate::state::SharedState;

// ── Pages ─────────────────────────────────────────────────────────────────────

pub async fn results_page(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Html<String>, ApiError> {
    let (experiment, status) = tokio::try_join!(
        state.coordinator.get_experiment(&id),
        state.coordinator.get_status(&id),
    )?;
    Ok(Html(render::results::results_page(&experiment, &status)))
}

pub async fn drift_page(
    State(state): State<SharedState>,
    Path((id, drift)): Path<(String, String)>,
) -> Result<Html<String>, ApiError> {
    let drift = drift_index(&id, &drift)?;
    let details = state.coordinator.get_drift(&id, drift).await?;
    Ok(Html(render::drift::drift_page(&id, &details)))
}

// ── Downloads ─────────────────────────────────────────────────────────────────

pub async fn results_download(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let content = state.coordinator.raw_status(&id).await?;
    Ok(attachment(format!("{id}.json"), content))
}

pub async fn drift_download(
    State(state): State<SharedState>,
    Path((id, drift)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let drift = drift_index(&id, &drift)?;
    let content = state.coordinator.raw_drift(&id, drift).await?;
    Ok(attachment(format!("{id}.drift_{drift}.json"), content))
}

/// Anything but a drift number names no document.
fn drift_index(id: &str, drift: &str) -> Result<usize, DynamikError> {
    drift
        .parse()
        .map_err(|_| DynamikError::NotFound(format!("drift {drift} of experiment {id}")))
}

fn attachment(filename: String, content: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename={filename}")),
        ],
        content,
    )
        .into_response()
}
