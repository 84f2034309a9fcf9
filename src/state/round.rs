use super::error::{RoomError, RoomResult};
use super::room::{Advance, Room};
use super::AppState;
use crate::protocol::ServerMessage;
use crate::types::*;
use std::time::Duration;

impl AppState {
    /// Host starts the first round
    pub async fn start_game(&self, room_code: &str, caller: &str) -> RoomResult<()> {
        let mut rooms = self.rooms.lock().await;
        let room = rooms
            .get_mut(room_code)
            .ok_or_else(|| RoomError::NotFound(room_code.to_string()))?;

        room.start_game(caller, self.prompts.pick(), now_ms())?;
        tracing::info!(
            "Room {} started round {}/{}",
            room_code,
            room.current_round_index,
            room.total_rounds
        );
        self.arm_draw_timer(room);
        room.broadcast_state();
        Ok(())
    }

    /// Host advances from the reveal: next round, or game over when the
    /// rounds are used up
    pub async fn start_new_round(&self, room_code: &str, caller: &str) -> RoomResult<()> {
        let mut rooms = self.rooms.lock().await;
        let room = rooms
            .get_mut(room_code)
            .ok_or_else(|| RoomError::NotFound(room_code.to_string()))?;

        match room.advance(caller, self.prompts.pick(), now_ms())? {
            Advance::NextRound => {
                tracing::info!(
                    "Room {} started round {}/{}",
                    room_code,
                    room.current_round_index,
                    room.total_rounds
                );
                self.arm_draw_timer(room);
                room.broadcast(ServerMessage::ClearResults);
            }
            Advance::GameOver(outcome) => {
                tracing::info!(
                    "Room {} game over, winners: {:?}",
                    room_code,
                    outcome.winner_ids
                );
                room.broadcast(ServerMessage::GameOver(outcome));
            }
        }
        room.broadcast_state();
        Ok(())
    }

    pub async fn reset_game(&self, room_code: &str, caller: &str) -> RoomResult<()> {
        let mut rooms = self.rooms.lock().await;
        let room = rooms
            .get_mut(room_code)
            .ok_or_else(|| RoomError::NotFound(room_code.to_string()))?;

        room.reset(caller)?;
        tracing::info!("Room {} reset to the lobby", room_code);
        room.broadcast(ServerMessage::ClearResults);
        room.broadcast_state();
        Ok(())
    }

    /// Store a drawing. Nothing is broadcast; drawings are revealed together.
    pub async fn submit_drawing(&self, room_code: &str, caller: &str, image: String) -> RoomResult<()> {
        let mut rooms = self.rooms.lock().await;
        let room = rooms
            .get_mut(room_code)
            .ok_or_else(|| RoomError::NotFound(room_code.to_string()))?;

        room.submit_drawing(caller, image)?;
        tracing::debug!(
            "Room {} got a drawing from {} ({}/{})",
            room_code,
            caller,
            room.round_submissions.len(),
            room.players.len()
        );
        Ok(())
    }

    pub async fn set_draw_time(&self, room_code: &str, caller: &str, ms: u64) -> RoomResult<()> {
        let mut rooms = self.rooms.lock().await;
        let room = rooms
            .get_mut(room_code)
            .ok_or_else(|| RoomError::NotFound(room_code.to_string()))?;

        room.set_draw_time(caller, ms)?;
        room.broadcast_state();
        Ok(())
    }

    pub async fn set_total_rounds(&self, room_code: &str, caller: &str, rounds: u32) -> RoomResult<()> {
        let mut rooms = self.rooms.lock().await;
        let room = rooms
            .get_mut(room_code)
            .ok_or_else(|| RoomError::NotFound(room_code.to_string()))?;

        room.set_total_rounds(caller, rounds)?;
        room.broadcast_state();
        Ok(())
    }

    /// Fires once the drawing time is up, keyed to the current generation
    fn arm_draw_timer(&self, room: &mut Room) {
        let state = self.clone();
        let code = room.code.clone();
        let generation = room.generation;
        let delay = Duration::from_millis(room.draw_time_ms);

        room.draw_timer.arm(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            state.on_draw_timer_elapsed(&code, generation).await;
        }));
    }

    fn arm_grace_timer(&self, room: &mut Room) {
        let state = self.clone();
        let code = room.code.clone();
        let generation = room.generation;
        let delay = self.grace_period;

        room.grace_timer.arm(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            state.on_grace_elapsed(&code, generation).await;
        }));
    }

    async fn on_draw_timer_elapsed(&self, room_code: &str, generation: u64) {
        let mut rooms = self.rooms.lock().await;
        let Some(room) = rooms.get_mut(room_code) else {
            tracing::debug!("Draw timer fired for removed room {}", room_code);
            return;
        };

        if let Err(e) = room.end_drawing(generation) {
            tracing::debug!("Room {}: {}", room_code, e);
            return;
        }
        self.arm_grace_timer(room);
    }

    async fn on_grace_elapsed(&self, room_code: &str, generation: u64) {
        let mut rooms = self.rooms.lock().await;
        let Some(room) = rooms.get_mut(room_code) else {
            tracing::debug!("Grace timer fired for removed room {}", room_code);
            return;
        };

        if let Err(e) = room.end_grace(generation) {
            tracing::debug!("Room {}: {}", room_code, e);
            return;
        }

        tracing::info!(
            "Room {} reviewing {} drawings",
            room_code,
            room.round_submissions.len()
        );
        room.broadcast(ServerMessage::ReviewDrawings {
            prompt: room.current_prompt.clone(),
            drawings: room.round_submissions.clone(),
        });
        room.broadcast_state();
    }
}
