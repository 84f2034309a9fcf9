use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Opaque ID types for type safety
pub type ConnectionId = String;
pub type RoomCode = String;

/// Longest nickname accepted, counted in characters after trimming
pub const NICKNAME_MAX_CHARS: usize = 15;

pub const DRAW_TIME_MIN_MS: u64 = 15_000;
pub const DRAW_TIME_MAX_MS: u64 = 120_000;
pub const DEFAULT_DRAW_TIME_MS: u64 = 30_000;

pub const TOTAL_ROUNDS_MIN: u32 = 1;
pub const TOTAL_ROUNDS_MAX: u32 = 10;
pub const DEFAULT_TOTAL_ROUNDS: u32 = 3;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GamePhase {
    Waiting,
    Drawing,
    /// Grace period after the draw timer; late submissions still count
    Collecting,
    Reviewing,
    Judging,
    Revealing,
    GameOver,
}

impl GamePhase {
    /// Check if a phase transition is valid
    pub fn is_valid_transition(from: GamePhase, to: GamePhase) -> bool {
        use GamePhase::*;

        matches!(
            (from, to),
            (Waiting, Drawing)
                | (Drawing, Collecting)
                | (Collecting, Reviewing)
                | (Reviewing, Judging)
                | (Judging, Revealing)
                // Next round
                | (Revealing, Drawing)
                | (Revealing, GameOver)
                | (GameOver, Waiting)
        )
    }

    /// Phase as shown to clients. The grace period is an implementation
    /// detail, so clients keep seeing the drawing screen.
    pub fn client_view(self) -> GamePhase {
        match self {
            GamePhase::Collecting => GamePhase::Drawing,
            other => other,
        }
    }

    pub fn accepts_submissions(self) -> bool {
        matches!(self, GamePhase::Drawing | GamePhase::Collecting)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Player {
    pub id: ConnectionId,
    pub nickname: String,
}

/// Room state as broadcast to every participant
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoomSnapshot {
    pub room_code: RoomCode,
    pub players: Vec<Player>,
    pub host_id: ConnectionId,
    pub phase: GamePhase,
    pub current_prompt: Option<String>,
    /// Drawing deadline in epoch milliseconds
    pub timer_end_time: Option<i64>,
    pub draw_time_ms: u64,
    pub total_rounds: u32,
    pub current_round_index: u32,
    pub cumulative_scores: HashMap<ConnectionId, u32>,
    pub server_now: i64,
}

/// Everything revealed at the end of a judged round
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoundResults {
    pub prompt: Option<String>,
    pub drawings: HashMap<ConnectionId, String>,
    pub winner_id: Option<ConnectionId>,
    pub scores: HashMap<ConnectionId, u32>,
    pub comments: HashMap<ConnectionId, String>,
}

/// Final standings once the last round has been revealed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameOutcome {
    /// Every player holding the top cumulative score, in join order
    pub winner_ids: Vec<ConnectionId>,
    pub is_tie: bool,
    pub final_scores: HashMap<ConnectionId, u32>,
}

/// Current wall-clock time in epoch milliseconds
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
