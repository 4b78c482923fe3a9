//! Per-connection read loop.
//!
//! The write half of the socket is handed to the [`ConnectionRegistry`]
//! right after the handshake; from then on this task only reads. Every text
//! frame becomes a submission through the message service. Outbound
//! traffic, including this client's own echo, arrives through the
//! notification listener's broadcast.
//!
//! If the registry drops the connection after a failed send, the read loop
//! stops too, even while the peer keeps writing.
//!
//! [`ConnectionRegistry`]: crate::domain::ConnectionRegistry

use axum::extract::ws::{Message, WebSocket};
use futures_util::{Stream, StreamExt};

use super::sink::WsSink;
use crate::app_state::AppState;
use crate::domain::{ConnectionId, Released};
use crate::error::RelayError;

/// Runs the lifecycle of a single WebSocket connection.
pub async fn run_connection(socket: WebSocket, state: AppState) {
    let connection_id = ConnectionId::generate();
    let (ws_tx, ws_rx) = socket.split();

    let released = match state
        .registry
        .connect(connection_id.clone(), Box::new(WsSink::new(ws_tx)))
        .await
    {
        Ok(released) => released,
        Err(e) => {
            tracing::error!(error = %e, "rejecting websocket connection");
            return;
        }
    };

    read_frames(&state, &connection_id, ws_rx, released).await;

    state.registry.disconnect(&connection_id).await;
    tracing::debug!(connection_id = %connection_id, "ws connection closed");
}

/// Submits inbound text frames until the peer goes away or the registry
/// releases the connection after a failed send.
async fn read_frames<S>(
    state: &AppState,
    connection_id: &ConnectionId,
    mut frames: S,
    mut released: Released,
) where
    S: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    loop {
        let next = tokio::select! {
            () = &mut released => {
                tracing::debug!(connection_id = %connection_id, "released by registry, reader stopping");
                return;
            }
            next = frames.next() => next,
        };

        match next {
            Some(Ok(Message::Text(text))) => handle_text(state, connection_id, text.as_str()).await,
            Some(Ok(Message::Close(_))) | None => return,
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                tracing::debug!(connection_id = %connection_id, error = %e, "websocket read failed");
                return;
            }
        }
    }
}

/// Submits one inbound frame; persistence failures are reported back to
/// the sender only.
async fn handle_text(state: &AppState, connection_id: &ConnectionId, text: &str) {
    let result = state
        .message_service
        .submit_from_connection(connection_id, text)
        .await;

    if let Err(e) = result {
        let frame = error_frame(&RelayError::from(e));
        if let Err(e) = state.registry.send_to(connection_id, &frame).await {
            tracing::debug!(connection_id = %connection_id, error = %e, "error frame not delivered");
        }
    }
}

/// Serializes an error as a WebSocket frame.
fn error_frame(err: &RelayError) -> String {
    serde_json::to_string(&err.to_error_response()).unwrap_or_default()
}
