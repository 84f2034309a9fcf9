pub mod error;
mod judging;
mod lobby;
pub mod prompts;
pub mod registry;
pub mod room;
mod round;
pub mod timer;

pub use error::{JoinError, RoomError, RoomResult};
pub use lobby::JoinedRoom;
pub use prompts::PromptDeck;
pub use registry::RoomRegistry;
pub use room::Room;

use crate::judge::{Judge, UnavailableJudge};
use std::sync::Arc;
use std::time::Duration;

/// Late-submission window after the draw timer
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_millis(1500);

/// Upper bound on a whole judging call, on top of the provider's own timeout
pub const DEFAULT_JUDGE_DEADLINE: Duration = Duration::from_secs(60);

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub rooms: RoomRegistry,
    pub judge: Arc<dyn Judge>,
    pub prompts: Arc<PromptDeck>,
    pub grace_period: Duration,
    pub judge_deadline: Duration,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            rooms: RoomRegistry::new(),
            judge: Arc::new(UnavailableJudge),
            prompts: Arc::new(PromptDeck::default()),
            grace_period: DEFAULT_GRACE_PERIOD,
            judge_deadline: DEFAULT_JUDGE_DEADLINE,
        }
    }

    pub fn with_judge(mut self, judge: Arc<dyn Judge>) -> Self {
        self.judge = judge;
        self
    }

    pub fn with_prompts(mut self, prompts: PromptDeck) -> Self {
        self.prompts = Arc::new(prompts);
        self
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    pub fn with_judge_deadline(mut self, judge_deadline: Duration) -> Self {
        self.judge_deadline = judge_deadline;
        self
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
