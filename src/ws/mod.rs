pub mod handlers;
mod lobby;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::protocol::{ClientMessage, ServerMessage, PROTOCOL_VERSION};
use crate::state::AppState;
use crate::types::{now_ms, ConnectionId, RoomCode};

/// Per-connection state. The connection id is the player's identity for
/// as long as the socket stays open.
pub struct Session {
    pub connection_id: ConnectionId,
    pub room_code: Option<RoomCode>,
    /// Events of the joined room
    pub events: Option<broadcast::Receiver<ServerMessage>>,
}

impl Session {
    pub fn new() -> Self {
        Self::with_id(ulid::Ulid::new().to_string())
    }

    pub fn with_id(connection_id: ConnectionId) -> Self {
        Self {
            connection_id,
            room_code: None,
            events: None,
        }
    }

    pub(crate) fn enter(&mut self, room_code: RoomCode, events: broadcast::Receiver<ServerMessage>) {
        self.room_code = Some(room_code);
        self.events = Some(events);
    }

    /// Leave the current room, if any. Called when the socket closes.
    pub async fn leave(&mut self, state: &AppState) {
        self.events = None;
        if let Some(code) = self.room_code.take() {
            state.leave_room(&code, &self.connection_id).await;
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Next event of the joined room. Pends forever outside a room.
async fn next_event(
    events: &mut Option<broadcast::Receiver<ServerMessage>>,
) -> Option<ServerMessage> {
    loop {
        let Some(rx) = events.as_mut() else {
            return std::future::pending().await;
        };
        match rx.recv().await {
            Ok(msg) => return Some(msg),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!("Connection lagged behind, skipped {} room events", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => {
                *events = None;
            }
        }
    }
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut session = Session::new();

    tracing::info!("WebSocket connected: {}", session.connection_id);

    // Send welcome message
    let welcome = ServerMessage::Welcome {
        protocol: PROTOCOL_VERSION.to_string(),
        connection_id: session.connection_id.clone(),
        server_now: now_ms(),
    };

    if let Ok(msg) = serde_json::to_string(&welcome) {
        if sender.send(Message::Text(msg.into())).await.is_err() {
            tracing::error!("Failed to send welcome message");
            return;
        }
    }

    // Handle incoming messages and room broadcasts
    loop {
        tokio::select! {
            Some(event) = next_event(&mut session.events) => {
                if let Ok(json) = serde_json::to_string(&event) {
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
            }

            // Handle client messages
            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => {
                                if let Some(response) =
                                    handlers::handle_message(client_msg, &mut session, &state).await
                                {
                                    if let Ok(json) = serde_json::to_string(&response) {
                                        if sender.send(Message::Text(json.into())).await.is_err() {
                                            tracing::error!("Failed to send response");
                                            break;
                                        }
                                    }
                                }
                            }
                            Err(e) => {
                                tracing::debug!("Failed to parse client message: {}", e);
                                let error = ServerMessage::Error {
                                    code: "PARSE_ERROR".to_string(),
                                    msg: format!("Invalid message format: {}", e),
                                };
                                if let Ok(json) = serde_json::to_string(&error) {
                                    let _ = sender.send(Message::Text(json.into())).await;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("WebSocket closed");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    session.leave(&state).await;
    tracing::info!("WebSocket connection closed: {}", session.connection_id);
}
