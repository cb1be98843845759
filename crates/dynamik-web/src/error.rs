//! Mapping from domain errors to HTTP responses.

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use tracing::{debug, error};

use dynamik_common::{DynamikError, RejectionKind};

use crate::render;

/// Handler error. Renders an HTML error page with the matching status.
#[derive(Debug)]
pub struct ApiError(pub DynamikError);

impl From<DynamikError> for ApiError {
    fn from(err: DynamikError) -> Self {
        Self(err)
    }
}

pub fn status_for(err: &DynamikError) -> StatusCode {
    match err {
        DynamikError::NotFound(_) => StatusCode::NOT_FOUND,
        DynamikError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        DynamikError::UploadRejected { kind: RejectionKind::TooLarge, .. } => StatusCode::PAYLOAD_TOO_LARGE,
        DynamikError::UploadRejected { .. } => StatusCode::BAD_REQUEST,
        DynamikError::BackendUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        DynamikError::Stream(_)
        | DynamikError::Io(_)
        | DynamikError::Serialization(_)
        | DynamikError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            error!(status = status.as_u16(), "Request failed: {}", self.0);
        } else {
            debug!(status = status.as_u16(), "Request rejected: {}", self.0);
        }

        let message = match &self.0 {
            DynamikError::NotFound(_) => "The requested experiment or result does not exist.".to_string(),
            DynamikError::BackendUnavailable(_) => {
                "The experiment queue is unavailable right now, please try again later.".to_string()
            }
            _ if status.is_server_error() => "Something went wrong while handling the request.".to_string(),
            err => err.to_string(),
        };

        (status, Html(render::error_page(status, &message))).into_response()
    }
}
