//! services/api/src/web/ws_handler.rs
//!
//! This is the entry point and control loop for a WebSocket connection.
//! It registers the connection with the Connection Registry, pumps registry
//! events out to the socket, and feeds inbound frames to the core.

use crate::web::{protocol::ClientMessage, state::AppState};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    Extension,
};
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state, user_id))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>, user_id: Uuid) {
    let (sender, receiver) = socket.split();
    run_connection(sender, receiver, app_state, user_id).await;
}

/// The connection control loop, generic over the socket halves so tests can
/// drive it with channel-backed fakes.
async fn run_connection<Si, St>(
    sender: Si,
    mut receiver: St,
    app_state: Arc<AppState>,
    user_id: Uuid,
) where
    Si: Sink<Message> + Unpin + Send + 'static,
    St: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    info!(%user_id, "new WebSocket connection established");

    let mut conn = app_state.registry.register(user_id).await;
    let connection_id = conn.id;
    let closed = conn.closed.clone();

    // Forwarding task: registry events -> socket. Ends when the registry
    // drops the handle (slow consumer) or the socket sink dies.
    let forward_task = tokio::spawn(async move {
        let mut sender = sender;
        loop {
            tokio::select! {
                _ = conn.closed.cancelled() => break,
                event = conn.events.recv() => {
                    let Some(event) = event else { break };
                    let payload = match serde_json::to_string(&event) {
                        Ok(payload) => payload,
                        Err(e) => {
                            error!(%user_id, "failed to serialize event: {}", e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(payload.into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Inbound loop: typing indicators and read acknowledgments. Also exits
    // when the registry drops the handle, even if the client stays idle.
    loop {
        tokio::select! {
            _ = closed.cancelled() => {
                info!(%user_id, "registry dropped the connection handle");
                break;
            }
            frame = receiver.next() => {
                let Some(Ok(msg)) = frame else { break };
                match msg {
                    Message::Text(text) => {
                        handle_text_message(text.to_string(), &app_state, user_id).await;
                    }
                    Message::Close(_) => {
                        info!(%user_id, "client sent close message");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    // A disconnect unregisters immediately; in-flight sends targeting the
    // removed handle become no-ops inside the registry.
    app_state.registry.unregister(user_id, connection_id).await;
    forward_task.abort();
    info!(%user_id, "WebSocket connection closed");
}

/// Helper function to handle the logic for different `ClientMessage` variants.
async fn handle_text_message(text: String, app_state: &Arc<AppState>, user_id: Uuid) {
    match serde_json::from_str::<ClientMessage>(&text) {
        Ok(ClientMessage::Typing {
            conversation_id,
            is_typing,
        }) => {
            if let Err(e) = app_state
                .delivery
                .broadcast_typing(conversation_id, user_id, is_typing)
                .await
            {
                warn!(%user_id, conversation_id, "typing broadcast rejected: {}", e);
            }
        }
        Ok(ClientMessage::MarkRead { conversation_id }) => {
            if let Err(e) = app_state.messages.mark_read(conversation_id, user_id).await {
                warn!(%user_id, conversation_id, "mark_read rejected: {}", e);
            }
        }
        Err(e) => {
            warn!("failed to deserialize client message: {}", e);
        }
    }
}
