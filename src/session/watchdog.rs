//! Periodic inactivity poll.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

/// Background task calling `on_tick` every `period` until it returns false.
///
/// Dropping the watch aborts the task, so replacing it never leaves a
/// duplicate timer behind.
#[derive(Debug)]
pub struct InactivityWatch {
    handle: JoinHandle<()>,
}

impl InactivityWatch {
    /// Must be called from within a tokio runtime
    pub fn spawn<F>(period: Duration, mut on_tick: F) -> Self
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut ticker = time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if !on_tick() {
                    break;
                }
            }
        });
        Self { handle }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for InactivityWatch {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
