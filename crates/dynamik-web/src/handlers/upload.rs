//! Log upload: the first page of a new experiment.

use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use tracing::{info, warn};

use dynamik_common::units::format_size;
use dynamik_common::{DynamikError, RejectionKind};
use dynamik_experiments::upload::merge_headers;
use dynamik_experiments::{Draft, UploadedFile};

use crate::error::{status_for, ApiError};
use crate::render;
use crate::state::SharedState;

pub async fn upload_page(State(state): State<SharedState>) -> Html<String> {
    Html(render::upload::upload_page(None, state.upload.max_bytes))
}

/// Check and store the uploaded logs, open a draft with suggested column
/// assignments, then continue to the wizard.
pub async fn upload_submit(State(state): State<SharedState>, multipart: Multipart) -> Response {
    let files = match read_files(&state, multipart).await {
        Ok(files) => files,
        Err(err) => return rejection(&state, err),
    };
    if let Err(err) = state.upload.check(&files) {
        return rejection(&state, err);
    }

    match open_draft(&state, &files).await {
        Ok(draft) => {
            tokio::time::sleep(state.pacing.upload_delay()).await;
            Redirect::to(&format!("/setup-experiment?draft={}", draft.id)).into_response()
        }
        Err(err) => ApiError(err).into_response(),
    }
}

async fn open_draft(state: &SharedState, files: &[UploadedFile]) -> Result<Draft, DynamikError> {
    let logs = state.coordinator.store_logs(files).await?;
    let headers = merge_headers(files.iter().map(|f| f.content.as_slice()));

    let draft = Draft::new(logs, headers);
    state.coordinator.store().save_draft(&draft.id.to_string(), &draft).await?;
    info!(draft = %draft.id, columns = draft.headers.len(), "Draft opened");
    Ok(draft)
}

async fn read_files(state: &SharedState, mut multipart: Multipart) -> Result<Vec<UploadedFile>, DynamikError> {
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(|e| multipart_error("", state.upload.max_bytes, e))? {
        if field.name() != Some("files") {
            continue;
        }
        let name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(str::to_string);
        let content = field
            .bytes()
            .await
            .map_err(|e| multipart_error(&name, state.upload.max_bytes, e))?;

        // An empty file input still sends a nameless, empty part.
        if name.is_empty() && content.is_empty() {
            continue;
        }
        files.push(UploadedFile::new(name, content_type, content.to_vec()));
    }
    Ok(files)
}

fn multipart_error(file: &str, max_bytes: u64, err: MultipartError) -> DynamikError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        DynamikError::rejected(
            file,
            RejectionKind::TooLarge,
            format!("file is larger than {}", format_size(max_bytes)),
        )
    } else {
        DynamikError::rejected(file, RejectionKind::Empty, err.body_text())
    }
}

/// Upload page again, with the reason inline.
fn rejection(state: &SharedState, err: DynamikError) -> Response {
    if !matches!(err, DynamikError::UploadRejected { .. }) {
        return ApiError(err).into_response();
    }
    warn!("{err}");
    let page = render::upload::upload_page(Some(&err.to_string()), state.upload.max_bytes);
    (status_for(&err), Html(page)).into_response()
}
