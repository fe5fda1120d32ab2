//! Deferred-action timers
//!
//! Each scheduled timer is a spawned sleep that feeds `Event::TimerFired` back into
//! the coordinator's event channel. Cancelling aborts the task, so a cancelled timer
//! normally never fires; one that was already in flight is discarded by the
//! coordinator's token check.

use std::collections::HashMap;
use std::time::Duration;

use meshroom_core::{Event, EventSender, TimerId};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

#[derive(Debug, Default)]
pub struct TimerTable {
    timers: HashMap<TimerId, JoinHandle<()>>,
}

impl TimerTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, timer: TimerId, delay: Duration, events: EventSender) {
        self.timers.retain(|_, task| !task.is_finished());

        trace!(%timer, ?delay, "scheduling timer");
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if events.send(Event::TimerFired { timer }).await.is_err() {
                debug!(%timer, "coordinator gone before timer fired");
            }
        });
        if let Some(previous) = self.timers.insert(timer, task) {
            previous.abort();
        }
    }

    pub fn cancel(&mut self, timer: TimerId) {
        if let Some(task) = self.timers.remove(&timer) {
            trace!(%timer, "cancelling timer");
            task.abort();
        }
    }

    pub fn cancel_all(&mut self) {
        for (_, task) in self.timers.drain() {
            task.abort();
        }
    }

    /// Timers scheduled and not yet finished or cancelled
    pub fn active(&self) -> usize {
        self.timers.values().filter(|task| !task.is_finished()).count()
    }
}

impl Drop for TimerTable {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
