use std::{fmt, sync::Arc};

use shared::domain::{Participant, DEFAULT_COUNTDOWN_MS, DEFAULT_WINNER_COUNT};

pub type StartCallback = Arc<dyn Fn() + Send + Sync>;
pub type FinishCallback = Arc<dyn Fn(&[Participant]) + Send + Sync>;

/// Per-controller configuration. Fixed once the controller is built.
#[derive(Clone)]
pub struct RaffleOptions {
    pub participants: Vec<Participant>,
    pub winner_count: usize,
    pub countdown_ms: u64,
    /// Seeds every draw of this controller identically when set.
    pub seed: Option<u64>,
    pub on_start: Option<StartCallback>,
    pub on_finish: Option<FinishCallback>,
}

impl RaffleOptions {
    pub fn new<I, P>(participants: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Participant>,
    {
        Self {
            participants: participants.into_iter().map(Into::into).collect(),
            winner_count: DEFAULT_WINNER_COUNT,
            countdown_ms: DEFAULT_COUNTDOWN_MS,
            seed: None,
            on_start: None,
            on_finish: None,
        }
    }

    pub fn winner_count(mut self, winner_count: usize) -> Self {
        self.winner_count = winner_count;
        self
    }

    pub fn countdown_ms(mut self, countdown_ms: u64) -> Self {
        self.countdown_ms = countdown_ms;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn on_start(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_start = Some(Arc::new(callback));
        self
    }

    pub fn on_finish(mut self, callback: impl Fn(&[Participant]) + Send + Sync + 'static) -> Self {
        self.on_finish = Some(Arc::new(callback));
        self
    }
}

impl Default for RaffleOptions {
    fn default() -> Self {
        Self::new(Vec::<Participant>::new())
    }
}

impl fmt::Debug for RaffleOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RaffleOptions")
            .field("participants", &self.participants)
            .field("winner_count", &self.winner_count)
            .field("countdown_ms", &self.countdown_ms)
            .field("seed", &self.seed)
            .field("on_start", &self.on_start.is_some())
            .field("on_finish", &self.on_finish.is_some())
            .finish()
    }
}
