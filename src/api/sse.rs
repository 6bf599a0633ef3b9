//! Server-Sent Events support

use crate::chat::Chat;
use crate::state_machine::SendState;
use crate::store::StoreEvent;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde_json::json;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Snapshot of a chat followed by its store events.
///
/// Events for other chats are filtered out; lagged events are skipped.
pub fn sse_stream(
    chat: Chat,
    send_state: SendState,
    store_rx: broadcast::Receiver<StoreEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let chat_id = chat.id.clone();
    let init = futures::stream::once(async move {
        Ok(Event::default().event("init").data(
            json!({
                "type": "init",
                "chat": chat,
                "send_state": send_state,
            })
            .to_string(),
        ))
    });

    let updates = BroadcastStream::new(store_rx).filter_map(move |result| match result {
        Ok(event) if event.chat_id() == chat_id => Some(Ok(store_event_to_axum(event))),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!(chat_id = %chat_id, error = %e, "SSE subscriber lagged");
            None
        }
    });

    Sse::new(init.chain(updates)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn store_event_to_axum(event: StoreEvent) -> Event {
    let (event_type, data) = match event {
        StoreEvent::ChatUpdated { chat } => (
            "chat_updated",
            json!({
                "type": "chat_updated",
                "chat": chat
            }),
        ),
        StoreEvent::ChatDeleted { chat_id } => (
            "chat_deleted",
            json!({
                "type": "chat_deleted",
                "chat_id": chat_id
            }),
        ),
    };

    Event::default().event(event_type).data(data.to_string())
}
