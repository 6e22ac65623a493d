//! Server-Sent Events for session changes

use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;

use crate::AppState;

/// GET /events
///
/// Streams SelectionChanged, PhotoQueued, PhotoRemoved, QueueReordered and
/// the Finalize* events so the preview page can refresh without polling.
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    snapshelf_common::sse::event_bus_sse_stream(&state.event_bus, "snapshelf-intake")
}
