use super::error::JoinError;
use super::registry::evict;
use super::AppState;
use crate::protocol::ServerMessage;
use crate::types::*;
use tokio::sync::broadcast;

/// Trimmed nickname, or `None` if it is empty or too long
pub fn normalize_nickname(raw: &str) -> Option<String> {
    let nickname = raw.trim();
    if nickname.is_empty() || nickname.chars().count() > NICKNAME_MAX_CHARS {
        return None;
    }
    Some(nickname.to_string())
}

/// A successful join
pub struct JoinedRoom {
    pub room_code: RoomCode,
    pub events: broadcast::Receiver<ServerMessage>,
    /// Present when the room is revealing a round
    pub results: Option<RoundResults>,
}

impl AppState {
    /// Create a room with the caller as host
    pub async fn host_game(
        &self,
        connection_id: &str,
        nickname: &str,
    ) -> Result<(RoomCode, broadcast::Receiver<ServerMessage>), JoinError> {
        let nickname = normalize_nickname(nickname).ok_or(JoinError::InvalidNickname)?;
        let host = Player {
            id: connection_id.to_string(),
            nickname,
        };
        Ok(self.rooms.create_room(host).await)
    }

    /// Join an existing room by code (case-insensitive)
    pub async fn join_game(
        &self,
        connection_id: &str,
        room_code: &str,
        nickname: &str,
    ) -> Result<JoinedRoom, JoinError> {
        let nickname = normalize_nickname(nickname).ok_or(JoinError::InvalidNickname)?;
        let room_code = room_code.trim().to_uppercase();

        let mut rooms = self.rooms.lock().await;
        let room = rooms.get_mut(&room_code).ok_or(JoinError::RoomNotFound)?;
        if room.nickname_taken(&nickname) {
            return Err(JoinError::NicknameTaken);
        }

        tracing::info!("{} joined room {} as {}", connection_id, room_code, nickname);
        room.add_player(Player {
            id: connection_id.to_string(),
            nickname,
        });

        let events = room.subscribe();
        room.broadcast_state();

        Ok(JoinedRoom {
            room_code,
            events,
            results: room.results(),
        })
    }

    /// Remove a connection from its room. Empty rooms are destroyed.
    pub async fn leave_room(&self, room_code: &str, connection_id: &str) {
        let mut rooms = self.rooms.lock().await;
        let Some(room) = rooms.get_mut(room_code) else {
            return;
        };
        let Some(departure) = room.remove_player(connection_id) else {
            return;
        };

        tracing::info!("{} left room {}", connection_id, room_code);
        if departure.room_empty {
            evict(&mut rooms, room_code);
            return;
        }

        if let Some(new_host) = &departure.new_host {
            tracing::info!("Room {} has a new host: {}", room_code, new_host);
        }
        room.broadcast_state();
    }
}
