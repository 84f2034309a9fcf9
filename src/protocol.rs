use crate::types::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const PROTOCOL_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Create a room and join it as host
    HostGame {
        nickname: String,
    },
    JoinGame {
        room_code: String,
        nickname: String,
    },
    // Host-only messages
    StartGame,
    /// Host advances from the reveal; ends the game once rounds are exhausted
    StartNewRound,
    ResetGame,
    SetDrawTime {
        ms: u64,
    },
    SetTotalRounds {
        rounds: u32,
    },
    // Any player
    /// Encoded drawing as a `data:image/...;base64,` URL
    SubmitDrawing {
        image: String,
    },
    RequestJudgment,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        protocol: String,
        connection_id: ConnectionId,
        server_now: i64,
    },
    RoomCreated {
        room_code: RoomCode,
    },
    JoinedRoom {
        room_code: RoomCode,
        /// Results of the round being revealed, for players joining mid-reveal
        #[serde(default, skip_serializing_if = "Option::is_none")]
        results: Option<RoundResults>,
    },
    RoomState(RoomSnapshot),
    /// All drawings of the round, shown to everyone before judging
    ReviewDrawings {
        prompt: Option<String>,
        drawings: HashMap<ConnectionId, String>,
    },
    RoundResults(RoundResults),
    GameOver(GameOutcome),
    ClearResults,
    JoinError {
        code: String,
        msg: String,
    },
    Error {
        code: String,
        msg: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_wire_format() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"t":"join_game","room_code":"ab3k","nickname":"Ann"}"#)
                .unwrap();
        match msg {
            ClientMessage::JoinGame {
                room_code,
                nickname,
            } => {
                assert_eq!(room_code, "ab3k");
                assert_eq!(nickname, "Ann");
            }
            other => panic!("Unexpected message: {:?}", other),
        }

        let msg: ClientMessage = serde_json::from_str(r#"{"t":"set_draw_time","ms":45000}"#).unwrap();
        assert!(matches!(msg, ClientMessage::SetDrawTime { ms: 45000 }));
    }

    #[test]
    fn test_room_state_is_flattened() {
        let snapshot = RoomSnapshot {
            room_code: "AB3K".to_string(),
            players: vec![],
            host_id: "h".to_string(),
            phase: GamePhase::Waiting,
            current_prompt: None,
            timer_end_time: None,
            draw_time_ms: DEFAULT_DRAW_TIME_MS,
            total_rounds: DEFAULT_TOTAL_ROUNDS,
            current_round_index: 0,
            cumulative_scores: HashMap::new(),
            server_now: 0,
        };
        let json = serde_json::to_value(ServerMessage::RoomState(snapshot)).unwrap();
        assert_eq!(json["t"], "room_state");
        assert_eq!(json["room_code"], "AB3K");
        assert_eq!(json["phase"], "WAITING");
    }

    #[test]
    fn test_joined_room_omits_missing_results() {
        let json = serde_json::to_value(ServerMessage::JoinedRoom {
            room_code: "AB3K".to_string(),
            results: None,
        })
        .unwrap();
        assert!(json.get("results").is_none());
    }
}
