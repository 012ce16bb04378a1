//! WebSocket endpoint for real-time messaging
//!
//! Each accepted connection registers its identity in the
//! `ConnectionRegistry` and runs two halves: a writer task draining the
//! connection's outbound channel into the socket, and a read loop feeding
//! inbound frames to the `MessageRouter`. Teardown unregisters the identity
//! and lets the writer finish whatever is already queued.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use nanoid::nanoid;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use clipstream_core::messaging::{ClientFrame, ConnectionHandle, ServerFrame};
use clipstream_core::models::UserId;

use crate::http::{AppError, AppResult, AppState};

/// WebSocket handler for the messaging channel
///
/// The identity is carried in the path and taken at face value; there is no
/// authentication on this surface.
pub async fn websocket_handler(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    ws: WebSocketUpgrade,
) -> AppResult<impl IntoResponse> {
    if user_id.trim().is_empty() {
        return Err(AppError::bad_request("user_id must not be blank"));
    }

    let user_id = UserId::from_string(user_id);

    Ok(ws
        .max_message_size(state.max_frame_bytes)
        .on_upgrade(move |socket| handle_socket(socket, state, user_id)))
}

async fn handle_socket(socket: WebSocket, state: AppState, user_id: UserId) {
    let connection_id = nanoid!(16);

    info!(
        user_id = %user_id.as_str(),
        connection_id = %connection_id,
        "WebSocket connection established"
    );

    let (outbound_tx, mut outbound_rx) = mpsc::channel::<ServerFrame>(state.outbound_buffer);

    // Registering drops any previous handle for this identity; the orphaned
    // connection's channel closes and its writer winds down on its own.
    state.registry.register(ConnectionHandle::new(
        connection_id.clone(),
        user_id.clone(),
        outbound_tx,
    ));

    let (mut ws_sink, mut ws_stream) = socket.split();

    // Writer half: outbound channel -> socket
    let writer = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            let text = match serde_json::to_string(&frame) {
                Ok(text) => text,
                Err(err) => {
                    warn!(error = %err, "Failed to serialize outbound frame");
                    continue;
                }
            };
            if ws_sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    // Read half: socket -> router. A malformed frame terminates the loop;
    // an unrecognized-but-well-formed one is skipped inside the router.
    while let Some(message) = ws_stream.next().await {
        match message {
            Ok(Message::Text(text)) => {
                match ClientFrame::parse(text.as_str()) {
                    Ok(frame) => {
                        debug!(
                            user_id = %user_id.as_str(),
                            frame_type = %frame.frame_type(),
                            "Inbound frame"
                        );
                        state.router.route(&user_id, frame).await;
                    }
                    Err(err) => {
                        warn!(
                            user_id = %user_id.as_str(),
                            connection_id = %connection_id,
                            error = %err,
                            "Malformed frame, closing connection"
                        );
                        break;
                    }
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {
                // Binary, ping and pong frames are ignored
            }
            Err(err) => {
                debug!(
                    user_id = %user_id.as_str(),
                    connection_id = %connection_id,
                    error = %err,
                    "WebSocket read error"
                );
                break;
            }
        }
    }

    // Unconditional teardown. The connection_id guard keeps a stale
    // teardown from evicting a replacement connection.
    state.registry.unregister(&user_id, &connection_id);

    // Unregistering dropped our sender, so the writer drains and exits
    let _ = writer.await;

    info!(
        user_id = %user_id.as_str(),
        connection_id = %connection_id,
        "WebSocket connection closed"
    );
}
