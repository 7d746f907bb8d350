/**
 * Real-time Subscription Handler
 *
 * SSE stream of the caller's realtime events (GET /api/realtime). Each
 * authenticated user subscribes to their own broadcast channel; chat
 * messages and notifications arrive as named SSE events.
 *
 * Connections are kept alive with SSE keep-alive comments. A lagged
 * receiver skips the missed events and keeps the connection; everything
 * pushed here is also persisted, so clients re-fetch on reconnect.
 */

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::stream;
use tokio::sync::broadcast::error::RecvError;

use crate::middleware::AuthUser;
use crate::server::state::AppState;

/// Handle realtime subscription (GET /api/realtime)
///
/// Returns a Server-Sent Events stream scoped to the authenticated user.
/// Event names are `chat_message` and `notification`; payloads are the
/// JSON-serialized `RealtimeEvent`.
pub async fn subscribe(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, axum::Error>>> {
    tracing::debug!("realtime stream opened for {}", user.username);

    let rx = state.realtime.sender_for(&user.username).subscribe();

    let stream = stream::unfold(rx, move |mut rx| async move {
        // Loop until an event serializes cleanly or the channel closes
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let data = match serde_json::to_string(&event) {
                        Ok(data) => data,
                        Err(e) => {
                            tracing::error!("failed to serialize realtime event: {e}");
                            continue;
                        }
                    };
                    let sse_event = Event::default().event(event.event_name()).data(data);
                    return Some((Ok(sse_event), rx));
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("realtime receiver lagged, skipped {skipped} events");
                    continue;
                }
                Err(RecvError::Closed) => {
                    return None;
                }
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
