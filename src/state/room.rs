//! A single room and its phase machine.
//!
//! Everything here is synchronous. Async work (timers, judging) is spawned by
//! the `AppState` methods in `round.rs` and `judging.rs`, which call back into
//! these methods under the registry lock with the generation they captured.

use super::error::{RoomError, RoomResult};
use super::timer::TaskSlot;
use crate::drawing::is_valid_drawing;
use crate::judge::scoring::select_winner;
use crate::judge::{Drawing, Judgment};
use crate::protocol::ServerMessage;
use crate::types::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;

/// Buffered events per room before slow subscribers start lagging
const EVENT_CAPACITY: usize = 64;

/// Process-wide so a generation is never reused, even across rooms that
/// happen to share a code after one was destroyed
static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

fn next_generation() -> u64 {
    NEXT_GENERATION.fetch_add(1, Ordering::Relaxed)
}

pub struct Room {
    pub code: RoomCode,
    /// Join order; index 0 is promoted when the host leaves
    pub players: Vec<Player>,
    pub host_id: ConnectionId,
    pub phase: GamePhase,
    pub current_prompt: Option<String>,
    pub timer_end_time: Option<i64>,
    pub draw_time_ms: u64,
    pub total_rounds: u32,
    pub current_round_index: u32,
    pub round_submissions: HashMap<ConnectionId, String>,
    pub round_scores: Option<HashMap<ConnectionId, u32>>,
    pub round_comments: Option<HashMap<ConnectionId, String>>,
    pub round_winner_id: Option<ConnectionId>,
    pub cumulative_scores: HashMap<ConnectionId, u32>,
    /// Changes on every phase transition; async continuations carry the value
    /// they were armed with and are dropped on mismatch
    pub generation: u64,
    pub(crate) draw_timer: TaskSlot,
    pub(crate) grace_timer: TaskSlot,
    pub(crate) judging: TaskSlot,
    events: broadcast::Sender<ServerMessage>,
}

/// What the judging task needs, captured when judgment is requested
#[derive(Debug, Clone)]
pub struct JudgingTicket {
    pub prompt: String,
    /// Join order
    pub drawings: Vec<Drawing>,
    pub generation: u64,
}

/// Result of the host advancing from the reveal
#[derive(Debug, Clone, PartialEq)]
pub enum Advance {
    NextRound,
    GameOver(GameOutcome),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    pub room_empty: bool,
    /// Set when the host left and someone else was promoted
    pub new_host: Option<ConnectionId>,
}

impl Room {
    pub fn new(code: RoomCode, host: Player) -> Self {
        let (events, _rx) = broadcast::channel(EVENT_CAPACITY);
        let mut cumulative_scores = HashMap::new();
        cumulative_scores.insert(host.id.clone(), 0);

        Self {
            code,
            host_id: host.id.clone(),
            players: vec![host],
            phase: GamePhase::Waiting,
            current_prompt: None,
            timer_end_time: None,
            draw_time_ms: DEFAULT_DRAW_TIME_MS,
            total_rounds: DEFAULT_TOTAL_ROUNDS,
            current_round_index: 0,
            round_submissions: HashMap::new(),
            round_scores: None,
            round_comments: None,
            round_winner_id: None,
            cumulative_scores,
            generation: next_generation(),
            draw_timer: TaskSlot::default(),
            grace_timer: TaskSlot::default(),
            judging: TaskSlot::default(),
            events,
        }
    }

    /// Move to `to` if the phase graph allows it
    pub fn transition(&mut self, to: GamePhase) -> RoomResult<()> {
        if !GamePhase::is_valid_transition(self.phase, to) {
            return Err(RoomError::InvalidTransition {
                from: self.phase,
                to,
            });
        }
        self.phase = to;
        self.generation = next_generation();
        Ok(())
    }

    pub fn is_host(&self, id: &str) -> bool {
        self.host_id == id
    }

    pub fn contains(&self, id: &str) -> bool {
        self.players.iter().any(|p| p.id == id)
    }

    /// Case-insensitive, as nicknames are compared when joining
    pub fn nickname_taken(&self, nickname: &str) -> bool {
        let wanted = nickname.to_lowercase();
        self.players
            .iter()
            .any(|p| p.nickname.to_lowercase() == wanted)
    }

    pub fn add_player(&mut self, player: Player) {
        self.cumulative_scores.insert(player.id.clone(), 0);
        self.players.push(player);
    }

    /// Remove a player along with their score and submission. Returns `None`
    /// if they were not in the room.
    pub fn remove_player(&mut self, id: &str) -> Option<Departure> {
        let index = self.players.iter().position(|p| p.id == id)?;
        self.players.remove(index);
        self.cumulative_scores.remove(id);
        self.round_submissions.remove(id);

        if self.players.is_empty() {
            return Some(Departure {
                room_empty: true,
                new_host: None,
            });
        }

        let mut new_host = None;
        if self.host_id == id {
            self.host_id = self.players[0].id.clone();
            new_host = Some(self.host_id.clone());
        }

        Some(Departure {
            room_empty: false,
            new_host,
        })
    }

    fn require_member(&self, caller: &str) -> RoomResult<()> {
        if self.contains(caller) {
            Ok(())
        } else {
            Err(RoomError::NotInRoom(caller.to_string()))
        }
    }

    fn require_host(&self, caller: &str, action: &'static str) -> RoomResult<()> {
        self.require_member(caller)?;
        if self.is_host(caller) {
            Ok(())
        } else {
            Err(RoomError::NotHost(action))
        }
    }

    fn require_phase(&self, phase: GamePhase, action: &'static str) -> RoomResult<()> {
        if self.phase == phase {
            Ok(())
        } else {
            Err(RoomError::WrongPhase {
                action,
                phase: self.phase,
            })
        }
    }

    fn clear_round(&mut self) {
        self.round_submissions.clear();
        self.round_scores = None;
        self.round_comments = None;
        self.round_winner_id = None;
    }

    /// Abort every pending timer and judging task
    pub fn cancel_tasks(&mut self) {
        self.draw_timer.cancel();
        self.grace_timer.cancel();
        self.judging.cancel();
    }

    /// Host starts the first round
    pub fn start_game(&mut self, caller: &str, prompt: String, now: i64) -> RoomResult<()> {
        self.require_host(caller, "start the game")?;
        self.require_phase(GamePhase::Waiting, "start the game")?;
        self.start_round(prompt, now)
    }

    /// Shared by the first and every later round. The caller arms the draw
    /// timer afterwards with the new generation.
    fn start_round(&mut self, prompt: String, now: i64) -> RoomResult<()> {
        self.transition(GamePhase::Drawing)?;
        self.clear_round();
        self.cancel_tasks();
        self.current_round_index += 1;
        self.current_prompt = Some(prompt);
        self.timer_end_time = Some(now + self.draw_time_ms as i64);
        Ok(())
    }

    /// Draw timer elapsed
    pub fn end_drawing(&mut self, generation: u64) -> RoomResult<()> {
        if self.phase != GamePhase::Drawing || self.generation != generation {
            return Err(RoomError::Stale("draw timer"));
        }
        self.draw_timer.clear();
        self.transition(GamePhase::Collecting)
    }

    /// Grace period elapsed
    pub fn end_grace(&mut self, generation: u64) -> RoomResult<()> {
        if self.phase != GamePhase::Collecting || self.generation != generation {
            return Err(RoomError::Stale("grace timer"));
        }
        self.grace_timer.clear();
        self.transition(GamePhase::Reviewing)
    }

    /// Drawings in join order
    pub fn drawings(&self) -> Vec<Drawing> {
        self.players
            .iter()
            .filter_map(|p| {
                self.round_submissions.get(&p.id).map(|image| Drawing {
                    player_id: p.id.clone(),
                    image: image.clone(),
                })
            })
            .collect()
    }

    /// Any player may ask for judgment once drawings are under review
    pub fn begin_judging(&mut self, caller: &str) -> RoomResult<JudgingTicket> {
        self.require_member(caller)?;
        self.require_phase(GamePhase::Reviewing, "request judgment")?;
        self.transition(GamePhase::Judging)?;

        self.round_scores = None;
        self.round_comments = None;
        self.round_winner_id = None;

        Ok(JudgingTicket {
            prompt: self.current_prompt.clone().unwrap_or_default(),
            drawings: self.drawings(),
            generation: self.generation,
        })
    }

    /// Apply a judgment. Submitters the judge left out get zero; a skipped
    /// judgment gives every current player zero.
    pub fn complete_judging(&mut self, generation: u64, judgment: Judgment) -> RoomResult<()> {
        if self.phase != GamePhase::Judging || self.generation != generation {
            return Err(RoomError::Stale("judgment"));
        }

        let scores: HashMap<ConnectionId, u32> = match judgment.scores {
            // Only submitters still in the room are scored
            Some(mut scores) => {
                for id in self.round_submissions.keys() {
                    scores.entry(id.clone()).or_insert(0);
                }
                scores.retain(|id, _| self.round_submissions.contains_key(id));
                scores
            }
            // Judging was skipped; everyone present gets zero
            None => self.players.iter().map(|p| (p.id.clone(), 0)).collect(),
        };

        for (id, score) in &scores {
            if let Some(total) = self.cumulative_scores.get_mut(id) {
                *total += score;
            }
        }

        // A winner who left mid-judging no longer has a score
        let order: Vec<ConnectionId> = self.players.iter().map(|p| p.id.clone()).collect();
        self.round_winner_id = match judgment.winner_id {
            Some(id) if !scores.contains_key(&id) => select_winner(&scores, &order),
            winner => winner,
        };
        self.round_scores = Some(scores);
        self.round_comments = Some(judgment.comments.unwrap_or_default());
        self.judging.clear();
        self.transition(GamePhase::Revealing)
    }

    /// Host moves on from the reveal
    pub fn advance(&mut self, caller: &str, prompt: String, now: i64) -> RoomResult<Advance> {
        self.require_host(caller, "advance the game")?;
        self.require_phase(GamePhase::Revealing, "advance the game")?;

        if self.current_round_index >= self.total_rounds {
            self.transition(GamePhase::GameOver)?;
            self.cancel_tasks();
            return Ok(Advance::GameOver(self.game_outcome()));
        }

        self.start_round(prompt, now)?;
        Ok(Advance::NextRound)
    }

    /// Back to the lobby with the same players and settings
    pub fn reset(&mut self, caller: &str) -> RoomResult<()> {
        self.require_host(caller, "reset the game")?;
        self.require_phase(GamePhase::GameOver, "reset the game")?;
        self.transition(GamePhase::Waiting)?;

        self.cancel_tasks();
        self.clear_round();
        for score in self.cumulative_scores.values_mut() {
            *score = 0;
        }
        self.current_prompt = None;
        self.timer_end_time = None;
        self.current_round_index = 0;
        Ok(())
    }

    /// First submission per round wins
    pub fn submit_drawing(&mut self, caller: &str, image: String) -> RoomResult<()> {
        self.require_member(caller)?;
        if !self.phase.accepts_submissions() {
            return Err(RoomError::WrongPhase {
                action: "submit a drawing",
                phase: self.phase,
            });
        }
        if self.round_submissions.contains_key(caller) {
            return Err(RoomError::AlreadySubmitted(caller.to_string()));
        }
        if !is_valid_drawing(&image) {
            return Err(RoomError::InvalidDrawing);
        }

        self.round_submissions.insert(caller.to_string(), image);
        Ok(())
    }

    pub fn set_draw_time(&mut self, caller: &str, ms: u64) -> RoomResult<()> {
        self.require_host(caller, "change the draw time")?;
        self.require_phase(GamePhase::Waiting, "change the draw time")?;
        if !(DRAW_TIME_MIN_MS..=DRAW_TIME_MAX_MS).contains(&ms) {
            return Err(RoomError::InvalidDrawTime(ms));
        }
        self.draw_time_ms = ms;
        Ok(())
    }

    pub fn set_total_rounds(&mut self, caller: &str, rounds: u32) -> RoomResult<()> {
        self.require_host(caller, "change the number of rounds")?;
        self.require_phase(GamePhase::Waiting, "change the number of rounds")?;
        if !(TOTAL_ROUNDS_MIN..=TOTAL_ROUNDS_MAX).contains(&rounds) {
            return Err(RoomError::InvalidTotalRounds(rounds));
        }
        self.total_rounds = rounds;
        Ok(())
    }

    /// Everyone tied on the highest cumulative score, in join order
    pub fn game_outcome(&self) -> GameOutcome {
        let score_of = |id: &str| self.cumulative_scores.get(id).copied().unwrap_or(0);
        let best = self
            .players
            .iter()
            .map(|p| score_of(&p.id))
            .max()
            .unwrap_or(0);
        let winner_ids: Vec<ConnectionId> = self
            .players
            .iter()
            .filter(|p| score_of(&p.id) == best)
            .map(|p| p.id.clone())
            .collect();

        GameOutcome {
            is_tie: winner_ids.len() > 1,
            winner_ids,
            final_scores: self.cumulative_scores.clone(),
        }
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            room_code: self.code.clone(),
            players: self.players.clone(),
            host_id: self.host_id.clone(),
            phase: self.phase.client_view(),
            current_prompt: self.current_prompt.clone(),
            timer_end_time: self.timer_end_time,
            draw_time_ms: self.draw_time_ms,
            total_rounds: self.total_rounds,
            current_round_index: self.current_round_index,
            cumulative_scores: self.cumulative_scores.clone(),
            server_now: now_ms(),
        }
    }

    /// Results of the round being revealed, if any
    pub fn results(&self) -> Option<RoundResults> {
        if self.phase != GamePhase::Revealing {
            return None;
        }
        Some(RoundResults {
            prompt: self.current_prompt.clone(),
            drawings: self.round_submissions.clone(),
            winner_id: self.round_winner_id.clone(),
            scores: self.round_scores.clone().unwrap_or_default(),
            comments: self.round_comments.clone().unwrap_or_default(),
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerMessage> {
        self.events.subscribe()
    }

    /// Fan out to every subscriber. Having nobody listening is fine.
    pub fn broadcast(&self, msg: ServerMessage) {
        let _ = self.events.send(msg);
    }

    pub fn broadcast_state(&self) {
        self.broadcast(ServerMessage::RoomState(self.snapshot()));
    }
}
