//! Hosting and joining rooms
//!
//! These are the only commands whose failures are reported to the client.

use super::Session;
use crate::protocol::ServerMessage;
use crate::state::{AppState, JoinError};
use std::sync::Arc;

fn join_error(e: JoinError) -> Option<ServerMessage> {
    Some(ServerMessage::JoinError {
        code: e.code().to_string(),
        msg: e.to_string(),
    })
}

/// A connection belongs to at most one room
fn ensure_not_in_room(session: &Session) -> Result<(), JoinError> {
    match &session.room_code {
        Some(code) => Err(JoinError::AlreadyInRoom(code.clone())),
        None => Ok(()),
    }
}

pub async fn handle_host_game(
    state: &Arc<AppState>,
    session: &mut Session,
    nickname: String,
) -> Option<ServerMessage> {
    if let Err(e) = ensure_not_in_room(session) {
        return join_error(e);
    }

    match state.host_game(&session.connection_id, &nickname).await {
        Ok((room_code, events)) => {
            session.enter(room_code.clone(), events);
            Some(ServerMessage::RoomCreated { room_code })
        }
        Err(e) => {
            tracing::debug!("Host request from {} refused: {}", session.connection_id, e);
            join_error(e)
        }
    }
}

pub async fn handle_join_game(
    state: &Arc<AppState>,
    session: &mut Session,
    room_code: String,
    nickname: String,
) -> Option<ServerMessage> {
    if let Err(e) = ensure_not_in_room(session) {
        return join_error(e);
    }

    match state
        .join_game(&session.connection_id, &room_code, &nickname)
        .await
    {
        Ok(joined) => {
            session.enter(joined.room_code.clone(), joined.events);
            Some(ServerMessage::JoinedRoom {
                room_code: joined.room_code,
                results: joined.results,
            })
        }
        Err(e) => {
            tracing::debug!(
                "Join request from {} for {} refused: {}",
                session.connection_id,
                room_code,
                e
            );
            join_error(e)
        }
    }
}
