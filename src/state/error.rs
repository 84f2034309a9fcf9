//! Error types for room operations.

use crate::types::{ConnectionId, GamePhase, RoomCode};

/// Why a join or host request was refused. These are the only rejections
/// reported back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JoinError {
    #[error("Room not found.")]
    RoomNotFound,

    #[error("Invalid nickname.")]
    InvalidNickname,

    #[error("Nickname is already taken in this room.")]
    NicknameTaken,

    #[error("Already in room {0}.")]
    AlreadyInRoom(RoomCode),
}

impl JoinError {
    /// Stable code sent to clients
    pub fn code(&self) -> &'static str {
        match self {
            JoinError::RoomNotFound => "room-not-found",
            JoinError::InvalidNickname => "invalid-nickname",
            JoinError::NicknameTaken => "nickname-taken",
            JoinError::AlreadyInRoom(_) => "already-in-room",
        }
    }
}

/// Rejected room commands and stale callbacks. Never sent to clients.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    #[error("room {0} not found")]
    NotFound(RoomCode),

    #[error("connection {0} is not in this room")]
    NotInRoom(ConnectionId),

    #[error("only the host can {0}")]
    NotHost(&'static str),

    #[error("cannot {action} during {phase:?}")]
    WrongPhase {
        action: &'static str,
        phase: GamePhase,
    },

    #[error("invalid phase transition from {from:?} to {to:?}")]
    InvalidTransition { from: GamePhase, to: GamePhase },

    #[error("{0} already submitted a drawing this round")]
    AlreadySubmitted(ConnectionId),

    #[error("drawing payload is not a recognized image")]
    InvalidDrawing,

    #[error("draw time {0}ms is out of range")]
    InvalidDrawTime(u64),

    #[error("total rounds {0} is out of range")]
    InvalidTotalRounds(u32),

    #[error("stale {0} ignored")]
    Stale(&'static str),
}

pub type RoomResult<T> = Result<T, RoomError>;
