use axum::Extension;
use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::Stream;
use genline_core::RequestContext;
use tokio::sync::broadcast::error::RecvError;

use crate::state::AppState;

/// Handle `GET /v1/chats/{chat_id}/events`
///
/// Streams the chat's lifecycle events emitted after the request arrived.
/// Events owned by another user or subscription are never forwarded.
pub async fn chat_events(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
    Path(chat_id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let mut receiver = state.events().subscribe();

    let stream = async_stream::stream! {
        loop {
            match receiver.recv().await {
                Ok((id, event)) if id == chat_id && event.is_visible_to(&context) => {
                    yield Event::default().json_data(event);
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(chat_id = %chat_id, skipped, "chat event listener lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}
