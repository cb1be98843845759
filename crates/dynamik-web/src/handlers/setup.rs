//! Setup wizard: mapping, configuration, review and run.

use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use dynamik_common::DynamikError;
use dynamik_experiments::upload::preview_rows;
use dynamik_experiments::{Draft, NavAction, Outcome, Toast};

use crate::error::ApiError;
use crate::render;
use crate::state::SharedState;

/// Records of the first log shown on the mapping step, header included.
const PREVIEW_ROWS: usize = 6;

#[derive(Debug, Deserialize)]
pub struct DraftQuery {
    pub draft: Option<Uuid>,
}

// ── Handlers ──────────────────────────────────────────────────────────────────

pub async fn setup_page(
    State(state): State<SharedState>,
    Query(query): Query<DraftQuery>,
) -> Result<Response, ApiError> {
    let Some(draft) = load_draft(&state, query.draft).await? else {
        return Ok(Redirect::to("/").into_response());
    };
    Ok(render_wizard(&state, &draft, None, StatusCode::OK).await)
}

pub async fn setup_submit(
    State(state): State<SharedState>,
    Query(query): Query<DraftQuery>,
    Form(form): Form<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let Some(mut draft) = load_draft(&state, query.draft).await? else {
        return Ok(Redirect::to("/").into_response());
    };

    let action: NavAction = form.get("action").map(String::as_str).unwrap_or("next").parse()?;
    let outcome = draft.navigate(action, &form);
    debug!(draft = %draft.id, ?action, active = ?draft.wizard.active, "Wizard navigation");

    let response = match outcome {
        Outcome::Moved { toast, .. } => render_wizard(&state, &draft, toast.as_ref(), StatusCode::OK).await,
        Outcome::Blocked(toast) => {
            warn!(draft = %draft.id, "Run blocked: {}", toast.description);
            render_wizard(&state, &draft, Some(&toast), StatusCode::UNPROCESSABLE_ENTITY).await
        }
        Outcome::Submit => {
            let submission = state.coordinator.submit(
                draft.log_files(),
                draft.mapping.clone(),
                draft.config.clone(),
                draft.email.clone(),
            );
            let (result, ()) = tokio::join!(submission, tokio::time::sleep(state.pacing.submit_delay()));

            match result {
                Ok(id) => {
                    info!(draft = %draft.id, experiment_id = %id, "Draft submitted");
                    // The experiment is queued; a stale draft only affects the back button.
                    if let Err(e) = state.coordinator.store().save_draft(&draft.id.to_string(), &draft).await {
                        error!(draft = %draft.id, experiment_id = %id, "Failed to save submitted draft: {e}");
                    }
                    return Ok(Redirect::to(&format!("/results/{id}")).into_response());
                }
                Err(err @ DynamikError::Validation { .. }) => {
                    let toast = Toast::from(&err);
                    render_wizard(&state, &draft, Some(&toast), StatusCode::UNPROCESSABLE_ENTITY).await
                }
                Err(err) => return Err(err.into()),
            }
        }
    };

    state.coordinator.store().save_draft(&draft.id.to_string(), &draft).await?;
    Ok(response)
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// `None` when the draft is missing or unknown; the user starts over.
async fn load_draft(state: &SharedState, id: Option<Uuid>) -> Result<Option<Draft>, DynamikError> {
    let Some(id) = id else {
        return Ok(None);
    };
    match state.coordinator.store().read_draft::<Draft>(&id.to_string()).await {
        Ok(draft) => Ok(Some(draft)),
        Err(err) if err.is_not_found() => {
            debug!(draft = %id, "Unknown draft, back to upload");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

async fn render_wizard(state: &SharedState, draft: &Draft, toast: Option<&Toast>, status: StatusCode) -> Response {
    let preview = match draft.logs.first() {
        Some(log) => match state.coordinator.store().read_log(&log.file).await {
            Ok(content) => preview_rows(&content, PREVIEW_ROWS),
            Err(err) => {
                warn!(log = %log.file, "Log preview unavailable: {err}");
                Vec::new()
            }
        },
        None => Vec::new(),
    };
    (status, Html(render::wizard::wizard_page(draft, &preview, toast))).into_response()
}
