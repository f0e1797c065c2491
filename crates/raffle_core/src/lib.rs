use std::{
    ops::ControlFlow,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    time::Duration,
};

use chrono::Utc;
use shared::{
    domain::{Participant, RaffleState},
    protocol::{DrawRecord, RaffleEvent},
};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

pub mod options;
pub mod schedule;
pub mod selection;

pub use options::{FinishCallback, RaffleOptions, StartCallback};
pub use schedule::{RepeatingTask, ScheduleError};
pub use selection::draw_winners;

pub const TICK_MS: u64 = 1000;
const TICK_PERIOD: Duration = Duration::from_millis(TICK_MS);
const EVENT_CHANNEL_CAPACITY: usize = 64;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

enum TickOutcome {
    Stale,
    Counting(u64),
    Finished {
        record: DrawRecord,
        cancellations: u64,
    },
}

/// State reachable from the countdown task.
struct RaffleShared {
    participants: Vec<Participant>,
    winner_count: usize,
    countdown_ms: u64,
    seed: Option<u64>,
    on_start: Option<StartCallback>,
    on_finish: Option<FinishCallback>,
    state: watch::Sender<RaffleState>,
    events: broadcast::Sender<RaffleEvent>,
    last_draw: Mutex<Option<DrawRecord>>,
    /// Bumped on every start, reset and dispose, always while holding the
    /// `state` write lock. A tick only writes while the generation it was
    /// spawned with is still current.
    generation: AtomicU64,
    /// Bumped by reset and dispose only, under the same lock. A finished
    /// draw is announced unless one of them happened after its state write.
    cancellations: AtomicU64,
}

impl RaffleShared {
    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn cancel_runs(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.cancellations.fetch_add(1, Ordering::SeqCst);
    }

    fn tick(&self, generation: u64) -> ControlFlow<()> {
        match self.advance(generation) {
            TickOutcome::Stale => ControlFlow::Break(()),
            TickOutcome::Counting(remaining_ms) => {
                debug!(remaining_ms, "raffle: tick");
                let _ = self.events.send(RaffleEvent::Tick { remaining_ms });
                ControlFlow::Continue(())
            }
            finished @ TickOutcome::Finished { .. } => {
                self.announce(finished);
                ControlFlow::Break(())
            }
        }
    }

    /// The state half of a tick. Runs entirely under the `state` write lock.
    fn advance(&self, generation: u64) -> TickOutcome {
        let mut outcome = TickOutcome::Stale;
        self.state.send_if_modified(|state| {
            if !self.is_current(generation) || !state.is_running {
                return false;
            }
            if state.remaining_ms <= TICK_MS {
                let mut rng = selection::draw_rng(self.seed);
                let winners = draw_winners(&self.participants, self.winner_count, &mut rng);
                let record = DrawRecord {
                    winners: winners.clone(),
                    participant_count: self.participants.len(),
                    drawn_at: Utc::now(),
                };
                state.remaining_ms = 0;
                state.is_running = false;
                state.winners = winners;
                *lock(&self.last_draw) = Some(record.clone());
                outcome = TickOutcome::Finished {
                    record,
                    cancellations: self.cancellations.load(Ordering::SeqCst),
                };
            } else {
                state.remaining_ms -= TICK_MS;
                outcome = TickOutcome::Counting(state.remaining_ms);
            }
            true
        });
        outcome
    }

    /// Publishes a finished draw and runs `on_finish`, outside every lock.
    /// A new start in between does not suppress it; a reset or dispose does.
    fn announce(&self, outcome: TickOutcome) {
        let TickOutcome::Finished {
            record,
            cancellations,
        } = outcome
        else {
            return;
        };
        if self.cancellations.load(Ordering::SeqCst) != cancellations {
            debug!("raffle: finished draw cancelled before it was announced");
            return;
        }
        info!(
            winners = record.winners.len(),
            participants = record.participant_count,
            "raffle: draw finished"
        );
        let _ = self.events.send(RaffleEvent::Finished {
            record: record.clone(),
        });
        if let Some(on_finish) = &self.on_finish {
            on_finish(&record.winners);
        }
    }
}

/// Drives one raffle: a countdown ticking once per second, then a random
/// draw of `winner_count` participants.
///
/// Needs a tokio runtime with the time driver when `start_raffle` is called.
/// At most one countdown runs per controller; dropping the controller stops
/// it without touching state again.
pub struct RaffleController {
    shared: Arc<RaffleShared>,
    schedule: Mutex<Option<RepeatingTask>>,
    disposed: AtomicBool,
}

impl RaffleController {
    pub fn new(options: RaffleOptions) -> Self {
        let RaffleOptions {
            participants,
            winner_count,
            countdown_ms,
            seed,
            on_start,
            on_finish,
        } = options;
        let (state, _) = watch::channel(RaffleState::idle(countdown_ms));
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            shared: Arc::new(RaffleShared {
                participants,
                winner_count,
                countdown_ms,
                seed,
                on_start,
                on_finish,
                state,
                events,
                last_draw: Mutex::new(None),
                generation: AtomicU64::new(0),
                cancellations: AtomicU64::new(0),
            }),
            schedule: Mutex::new(None),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn participants(&self) -> &[Participant] {
        &self.shared.participants
    }

    pub fn winner_count(&self) -> usize {
        self.shared.winner_count
    }

    pub fn countdown_ms(&self) -> u64 {
        self.shared.countdown_ms
    }

    pub fn winners(&self) -> Vec<Participant> {
        self.shared.state.borrow().winners.clone()
    }

    pub fn is_running(&self) -> bool {
        self.shared.state.borrow().is_running
    }

    pub fn remaining_ms(&self) -> u64 {
        self.shared.state.borrow().remaining_ms
    }

    pub fn snapshot(&self) -> RaffleState {
        self.shared.state.borrow().clone()
    }

    pub fn last_draw(&self) -> Option<DrawRecord> {
        lock(&self.shared.last_draw).clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<RaffleState> {
        self.shared.state.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<RaffleEvent> {
        self.shared.events.subscribe()
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Begins the countdown. Does nothing when there are no participants,
    /// a countdown is already running, or the controller was disposed.
    pub fn start_raffle(&self) {
        if self.is_disposed() {
            debug!("raffle: start ignored, controller disposed");
            return;
        }
        if self.shared.participants.is_empty() {
            debug!("raffle: start ignored, no participants");
            return;
        }

        let countdown_ms = self.shared.countdown_ms;
        let mut generation = 0;
        let started = self.shared.state.send_if_modified(|state| {
            if state.is_running {
                return false;
            }
            generation = self.shared.next_generation();
            state.is_running = true;
            state.remaining_ms = countdown_ms;
            state.winners.clear();
            true
        });
        if !started {
            debug!("raffle: start ignored, countdown already running");
            return;
        }

        info!(
            participants = self.shared.participants.len(),
            winner_count = self.shared.winner_count,
            countdown_ms,
            "raffle: countdown started"
        );
        let _ = self.shared.events.send(RaffleEvent::Started { countdown_ms });
        if let Some(on_start) = &self.shared.on_start {
            on_start();
        }

        let mut schedule = lock(&self.schedule);
        // on_start may have reset or disposed the controller.
        if !self.shared.is_current(generation) {
            return;
        }
        if let Some(mut previous) = schedule.take() {
            previous.cancel();
        }

        let shared = Arc::clone(&self.shared);
        match RepeatingTask::spawn(TICK_PERIOD, move || shared.tick(generation)) {
            Ok(task) => *schedule = Some(task),
            Err(err) => {
                warn!(error = %err, "raffle: countdown could not be scheduled");
                self.shared.state.send_modify(|state| {
                    self.shared.next_generation();
                    *state = RaffleState::idle(countdown_ms);
                });
            }
        }
    }

    /// Cancels any running countdown and returns to the initial idle state.
    pub fn reset_raffle(&self) {
        if self.is_disposed() {
            debug!("raffle: reset ignored, controller disposed");
            return;
        }

        {
            let mut schedule = lock(&self.schedule);
            self.shared.state.send_modify(|state| {
                self.shared.cancel_runs();
                *state = RaffleState::idle(self.shared.countdown_ms);
                *lock(&self.shared.last_draw) = None;
            });
            if let Some(mut task) = schedule.take() {
                task.cancel();
            }
        }

        info!("raffle: reset");
        let _ = self.shared.events.send(RaffleEvent::Reset);
    }

    /// Stops the countdown for good. State is left exactly as it was and no
    /// later call changes it. Dropping the controller does the same.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut schedule = lock(&self.schedule);
        self.shared.state.send_if_modified(|_| {
            self.shared.cancel_runs();
            false
        });
        if let Some(mut task) = schedule.take() {
            task.cancel();
            debug!("raffle: pending countdown cancelled on dispose");
        }
    }
}

impl Drop for RaffleController {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
