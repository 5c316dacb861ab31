//! Owned, cancelable background tasks.
//!
//! A [`TimerSlot`] holds at most one task. Replacing or dropping the slot
//! aborts the task it held, so a slot can never leak a second live timer.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::domain::session::Event;

#[derive(Debug)]
pub struct TimerSlot {
    name: &'static str,
    handle: Option<JoinHandle<()>>,
}

impl TimerSlot {
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self { name, handle: None }
    }

    /// Install `handle`, aborting whatever the slot held before.
    pub fn replace(&mut self, handle: JoinHandle<()>) {
        self.cancel();
        tracing::trace!(timer = self.name, "armed");
        self.handle = Some(handle);
    }

    /// Abort the held task. Returns `true` if there was one.
    pub fn cancel(&mut self) -> bool {
        match self.handle.take() {
            Some(handle) => {
                handle.abort();
                tracing::trace!(timer = self.name, "cancelled");
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for TimerSlot {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Send `seconds` [`Event::CountdownTick`]s, one per second, tagged with `arm`.
pub fn spawn_countdown(arm: u64, seconds: u64, events: mpsc::Sender<Event>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = Duration::from_secs(1);
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        for _ in 0..seconds {
            ticker.tick().await;
            if events
                .send(Event::CountdownTick { arm, at: Utc::now() })
                .await
                .is_err()
            {
                return;
            }
        }
    })
}
