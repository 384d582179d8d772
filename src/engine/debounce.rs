// src/engine/debounce.rs

use std::time::Duration;

use tokio::time::Instant;

use crate::models::session::TerminationReason;

/// Turns flickering presence samples into a single terminate decision.
///
/// Presence loss is a soft violation: the first absent sample starts a
/// grace countdown, a present sample before the deadline cancels it with
/// no trace, and an absent run that outlives the deadline terminates the
/// session. At most one countdown is live at a time; an absent sample
/// while one is pending never extends the deadline.
///
/// Hard violations (fullscreen exit, backgrounding) do not pass through
/// here; the session terminates on the first armed occurrence.
#[derive(Debug)]
pub struct ViolationDebouncer {
    grace: Duration,
    grace_deadline: Option<Instant>,
}

impl ViolationDebouncer {
    pub fn new(grace: Duration) -> Self {
        ViolationDebouncer {
            grace,
            grace_deadline: None,
        }
    }

    /// Feeds one presence sample. Returns the terminate decision when the
    /// grace window has been exhausted.
    pub fn observe_presence(
        &mut self,
        present: bool,
        now: Instant,
    ) -> Option<TerminationReason> {
        if present {
            self.grace_deadline = None;
            return None;
        }

        match self.grace_deadline {
            None => {
                self.grace_deadline = Some(now + self.grace);
                None
            }
            Some(deadline) => {
                if now >= deadline {
                    self.grace_deadline = None;
                    Some(TerminationReason::PresenceLost)
                } else {
                    None
                }
            }
        }
    }

    /// Deadline check between samples, driven by the timer tick. The
    /// countdown can expire here even if the detector never reports again.
    pub fn poll_deadline(&mut self, now: Instant) -> Option<TerminationReason> {
        match self.grace_deadline {
            Some(deadline) if now >= deadline => {
                self.grace_deadline = None;
                Some(TerminationReason::PresenceLost)
            }
            _ => None,
        }
    }

    /// Time left on the active grace countdown, for the candidate-facing
    /// warning. `None` when no countdown is live.
    pub fn grace_remaining(&self, now: Instant) -> Option<Duration> {
        self.grace_deadline
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    pub fn countdown_active(&self) -> bool {
        self.grace_deadline.is_some()
    }
}
