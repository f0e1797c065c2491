//! Cancellable fixed-period repeating task on the tokio timer.

use std::{ops::ControlFlow, time::Duration};

use thiserror::Error;
use tokio::{
    runtime::Handle,
    task::JoinHandle,
    time::{interval_at, Instant},
};

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("no tokio runtime available to drive the schedule")]
    NoRuntime,
}

/// Handle to a spawned repeating task. The first tick fires one `period`
/// after spawning. Dropping the handle cancels the task.
#[derive(Debug)]
pub struct RepeatingTask {
    handle: Option<JoinHandle<()>>,
}

impl RepeatingTask {
    /// Runs `on_tick` every `period` until it returns `ControlFlow::Break`
    /// or the task is cancelled.
    pub fn spawn<F>(period: Duration, mut on_tick: F) -> Result<Self, ScheduleError>
    where
        F: FnMut() -> ControlFlow<()> + Send + 'static,
    {
        let runtime = Handle::try_current().map_err(|_| ScheduleError::NoRuntime)?;
        let first_tick = Instant::now() + period;
        let handle = runtime.spawn(async move {
            let mut ticker = interval_at(first_tick, period);
            loop {
                ticker.tick().await;
                if on_tick().is_break() {
                    break;
                }
            }
        });

        Ok(Self {
            handle: Some(handle),
        })
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    #[cfg(test)]
    fn is_active(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for RepeatingTask {
    fn drop(&mut self) {
        self.cancel();
    }
}
