//! Fixed-interval retry until a deadline

use std::time::Duration;
use tokio::time::{Instant, sleep};

/// Lower bound on the poll interval; a zero interval would spin
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Retry-with-fixed-interval-until-deadline primitive.
///
/// The caller checks its condition, then calls [`Poller::wait_next`] to sleep
/// until the next attempt. `wait_next` never sleeps past the deadline and
/// returns `false` once the deadline has been reached, so a loop built on it
/// ends at most one interval after `timeout`.
#[derive(Debug)]
pub struct Poller {
    interval: Duration,
    started: Instant,
    deadline: Instant,
    attempts: u32,
}

impl Poller {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        let started = Instant::now();
        Self {
            interval: interval.max(MIN_POLL_INTERVAL),
            started,
            deadline: started + timeout,
            attempts: 1,
        }
    }

    /// Sleep until the next attempt. Returns `false` when the deadline has passed.
    pub async fn wait_next(&mut self) -> bool {
        let remaining = self.remaining();
        if remaining.is_zero() {
            return false;
        }

        sleep(self.interval.min(remaining)).await;
        self.attempts += 1;
        true
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Number of attempts started so far, counting the first one
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}
