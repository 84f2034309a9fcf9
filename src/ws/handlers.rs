//! WebSocket message dispatch
//!
//! Lobby commands answer the sender directly. Room commands answer through
//! the room's broadcast channel; when they are rejected (wrong phase, not the
//! host, duplicate click) the rejection is logged and dropped.

use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::{AppState, RoomResult};
use std::sync::Arc;

use super::{lobby, Session};

/// Resolve the sender's room or drop the command
macro_rules! in_room {
    ($session:expr, $action:expr) => {
        match $session.room_code.clone() {
            Some(code) => code,
            None => {
                tracing::debug!(
                    "Ignoring {} from {}: not in a room",
                    $action,
                    $session.connection_id
                );
                return None;
            }
        }
    };
}

fn log_rejection(action: &str, session: &Session, result: RoomResult<()>) -> Option<ServerMessage> {
    if let Err(e) = result {
        tracing::debug!(
            "Rejected {} from {} in {:?}: {}",
            action,
            session.connection_id,
            session.room_code,
            e
        );
    }
    None
}

/// Handle client messages and return optional response
pub async fn handle_message(
    msg: ClientMessage,
    session: &mut Session,
    state: &Arc<AppState>,
) -> Option<ServerMessage> {
    match msg {
        // Lobby messages
        ClientMessage::HostGame { nickname } => {
            lobby::handle_host_game(state, session, nickname).await
        }

        ClientMessage::JoinGame {
            room_code,
            nickname,
        } => lobby::handle_join_game(state, session, room_code, nickname).await,

        // Host-only commands (authorization checked by the room)
        ClientMessage::StartGame => {
            let code = in_room!(session, "start_game");
            let result = state.start_game(&code, &session.connection_id).await;
            log_rejection("start_game", session, result)
        }

        ClientMessage::StartNewRound => {
            let code = in_room!(session, "start_new_round");
            let result = state.start_new_round(&code, &session.connection_id).await;
            log_rejection("start_new_round", session, result)
        }

        ClientMessage::ResetGame => {
            let code = in_room!(session, "reset_game");
            let result = state.reset_game(&code, &session.connection_id).await;
            log_rejection("reset_game", session, result)
        }

        ClientMessage::SetDrawTime { ms } => {
            let code = in_room!(session, "set_draw_time");
            let result = state.set_draw_time(&code, &session.connection_id, ms).await;
            log_rejection("set_draw_time", session, result)
        }

        ClientMessage::SetTotalRounds { rounds } => {
            let code = in_room!(session, "set_total_rounds");
            let result = state
                .set_total_rounds(&code, &session.connection_id, rounds)
                .await;
            log_rejection("set_total_rounds", session, result)
        }

        // Any player
        ClientMessage::SubmitDrawing { image } => {
            let code = in_room!(session, "submit_drawing");
            let result = state
                .submit_drawing(&code, &session.connection_id, image)
                .await;
            log_rejection("submit_drawing", session, result)
        }

        ClientMessage::RequestJudgment => {
            let code = in_room!(session, "request_judgment");
            let result = state.request_judgment(&code, &session.connection_id).await;
            log_rejection("request_judgment", session, result)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GamePhase;

    fn session(id: &str) -> Session {
        Session::with_id(id.to_string())
    }

    #[tokio::test]
    async fn test_host_game_enters_room() {
        let state = Arc::new(AppState::new());
        let mut host = session("h");

        let reply = handle_message(
            ClientMessage::HostGame {
                nickname: "Hana".to_string(),
            },
            &mut host,
            &state,
        )
        .await;

        let Some(ServerMessage::RoomCreated { room_code }) = reply else {
            panic!("Expected RoomCreated, got {:?}", reply);
        };
        assert_eq!(host.room_code.as_deref(), Some(room_code.as_str()));
        assert!(host.events.is_some());
    }

    #[tokio::test]
    async fn test_second_host_game_is_refused() {
        let state = Arc::new(AppState::new());
        let mut host = session("h");
        let host_game = || ClientMessage::HostGame {
            nickname: "Hana".to_string(),
        };

        handle_message(host_game(), &mut host, &state).await;
        let reply = handle_message(host_game(), &mut host, &state).await;

        match reply {
            Some(ServerMessage::JoinError { code, .. }) => assert_eq!(code, "already-in-room"),
            other => panic!("Expected JoinError, got {:?}", other),
        }
        assert_eq!(state.rooms.len().await, 1);
    }

    #[tokio::test]
    async fn test_room_not_found() {
        let state = Arc::new(AppState::new());
        let mut player = session("p");

        let reply = handle_message(
            ClientMessage::JoinGame {
                room_code: "ZZZZ".to_string(),
                nickname: "Piet".to_string(),
            },
            &mut player,
            &state,
        )
        .await;

        match reply {
            Some(ServerMessage::JoinError { code, msg }) => {
                assert_eq!(code, "room-not-found");
                assert_eq!(msg, "Room not found.");
            }
            other => panic!("Expected JoinError, got {:?}", other),
        }
        assert!(player.room_code.is_none());
    }

    #[tokio::test]
    async fn test_room_commands_outside_room_are_dropped() {
        let state = Arc::new(AppState::new());
        let mut stranger = session("s");

        assert!(handle_message(ClientMessage::StartGame, &mut stranger, &state)
            .await
            .is_none());
        assert!(handle_message(ClientMessage::RequestJudgment, &mut stranger, &state)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_non_host_start_is_silently_rejected() {
        let state = Arc::new(AppState::new());
        let mut host = session("h");
        let mut player = session("p");

        let Some(ServerMessage::RoomCreated { room_code }) = handle_message(
            ClientMessage::HostGame {
                nickname: "Hana".to_string(),
            },
            &mut host,
            &state,
        )
        .await
        else {
            panic!("Expected RoomCreated");
        };
        handle_message(
            ClientMessage::JoinGame {
                room_code: room_code.clone(),
                nickname: "Piet".to_string(),
            },
            &mut player,
            &state,
        )
        .await;

        let reply = handle_message(ClientMessage::StartGame, &mut player, &state).await;
        assert!(reply.is_none());
        assert_eq!(
            state.rooms.inspect(&room_code, |r| r.phase).await,
            Some(GamePhase::Waiting)
        );
    }
}
