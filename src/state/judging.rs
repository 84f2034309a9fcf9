use super::error::{RoomError, RoomResult};
use super::AppState;
use crate::judge::Judgment;
use crate::protocol::ServerMessage;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;

impl AppState {
    /// Any player in the room may ask for judgment while drawings are under
    /// review. The judge runs outside the lock; its result is applied only
    /// if the room is still waiting for it.
    pub async fn request_judgment(&self, room_code: &str, caller: &str) -> RoomResult<()> {
        let mut rooms = self.rooms.lock().await;
        let room = rooms
            .get_mut(room_code)
            .ok_or_else(|| RoomError::NotFound(room_code.to_string()))?;

        let ticket = room.begin_judging(caller)?;
        tracing::info!(
            "Room {} judging {} drawings for {}",
            room_code,
            ticket.drawings.len(),
            caller
        );
        room.broadcast_state();

        let state = self.clone();
        let code = room_code.to_string();
        room.judging.arm(tokio::spawn(async move {
            let order: Vec<_> = ticket.drawings.iter().map(|d| d.player_id.clone()).collect();
            let call = AssertUnwindSafe(state.judge.judge(&ticket.prompt, &ticket.drawings))
                .catch_unwind();

            let judgment = match tokio::time::timeout(state.judge_deadline, call).await {
                Ok(Ok(judgment)) => judgment,
                Ok(Err(_)) => {
                    tracing::warn!("Judge panicked in room {}, scoring zero", code);
                    Judgment::fallback(&order)
                }
                Err(_) => {
                    tracing::warn!(
                        "Judge exceeded {:?} in room {}, scoring zero",
                        state.judge_deadline,
                        code
                    );
                    Judgment::fallback(&order)
                }
            };

            state.finish_judging(&code, ticket.generation, judgment).await;
        }));
        Ok(())
    }

    async fn finish_judging(&self, room_code: &str, generation: u64, judgment: Judgment) {
        let mut rooms = self.rooms.lock().await;
        let Some(room) = rooms.get_mut(room_code) else {
            tracing::debug!("Judgment arrived for removed room {}", room_code);
            return;
        };

        if let Err(e) = room.complete_judging(generation, judgment) {
            tracing::debug!("Room {}: {}", room_code, e);
            return;
        }

        tracing::info!(
            "Room {} revealing round {}, winner: {:?}",
            room_code,
            room.current_round_index,
            room.round_winner_id
        );
        if let Some(results) = room.results() {
            room.broadcast(ServerMessage::RoundResults(results));
        }
        room.broadcast_state();
    }
}
