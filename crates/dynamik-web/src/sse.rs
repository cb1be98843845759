//! Server-Sent Events (SSE) relay of live experiment status.

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::Stream;
use serde::Deserialize;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::StreamExt;

use crate::error::ApiError;
use crate::state::SharedState;

#[derive(Debug, Deserialize)]
pub struct LiveQuery {
    pub id: String,
}

/// `/live?id=…`: one event per status snapshot the worker reports for the
/// experiment. The broker subscription lives as long as the connection.
pub async fn live_handler(
    State(state): State<SharedState>,
    Query(query): Query<LiveQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let updates = state.coordinator.stream_status(&query.id).await?;
    let stream = updates.filter_map(|status| {
        serde_json::to_string(&status)
            .ok()
            .map(|data| Ok(Event::default().data(data)))
    });

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    ))
}
