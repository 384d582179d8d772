// src/engine/countdown.rs

use std::time::Duration;

use tokio::time::Instant;

/// Monotonic countdown for the exam clock.
///
/// Deadline-based rather than tick-accumulating, so the remaining time is
/// exact regardless of how often the monitor loop samples it. Uses
/// `tokio::time::Instant` throughout, which lets tests drive it on paused
/// virtual time.
#[derive(Debug, Clone, Copy)]
pub struct Countdown {
    deadline: Instant,
}

impl Countdown {
    pub fn start(total: Duration, now: Instant) -> Self {
        Countdown {
            deadline: now + total,
        }
    }

    /// Time left; saturates at zero.
    pub fn remaining(&self, now: Instant) -> Duration {
        self.deadline.saturating_duration_since(now)
    }

    pub fn expired(&self, now: Instant) -> bool {
        now >= self.deadline
    }
}
