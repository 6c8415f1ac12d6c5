//! Server-sent events endpoint for live reload.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures_util::stream;
use tokio::sync::broadcast::error::RecvError;

use crate::state::AppState;

/// Hold an event stream open and emit `reload` on every output change.
pub(crate) async fn sse_handler(State(state): State<Arc<AppState>>) -> Response {
    let Some(manager) = state.live_reload.as_ref() else {
        return StatusCode::NOT_FOUND.into_response();
    };

    // Subscribe before responding so no reload between connect and first poll is lost.
    let receiver = manager.subscribe();
    let client = manager.connect();

    let events = stream::unfold((receiver, client), |(mut receiver, client)| async move {
        let changed = match receiver.recv().await {
            Ok(event) => event.changed,
            // Missed events still mean the page is stale.
            Err(RecvError::Lagged(_)) => 0,
            Err(RecvError::Closed) => return None,
        };
        let event = Event::default().event("reload").data(changed.to_string());
        Some((Ok::<_, Infallible>(event), (receiver, client)))
    });

    Sse::new(events)
        .keep_alive(KeepAlive::default())
        .into_response()
}
