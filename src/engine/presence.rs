// src/engine/presence.rs

use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Failure kinds of the face-detection capability.
///
/// The engine treats every kind as "no face" for policy purposes; the
/// kind only matters for the diagnostic shown to the candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PresenceError {
    DeviceUnavailable,
    ModelLoadFailed,
    DetectionFailed,
}

impl fmt::Display for PresenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PresenceError::DeviceUnavailable => "camera device unavailable",
            PresenceError::ModelLoadFailed => "face detection model failed to load",
            PresenceError::DetectionFailed => "face detection failed",
        };
        f.write_str(s)
    }
}

/// A poll-able "face currently visible" capability.
///
/// The session engine only ever consumes this boolean; how the video and
/// detection stack produces it is outside the engine.
#[async_trait]
pub trait PresenceSignal: Send + Sync {
    async fn check_presence(&self) -> Result<bool, PresenceError>;
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    outcome: Result<bool, PresenceError>,
    at: Instant,
}

/// Client-fed implementation of [`PresenceSignal`].
///
/// The browser runs the detector and posts each sample here; the engine
/// polls on its own interval. A feed that has gone quiet for longer than
/// the staleness window reads as `DeviceUnavailable`, which the policy
/// layer handles exactly like an absent face.
#[derive(Debug)]
pub struct PresenceFeed {
    staleness: Duration,
    latest: Mutex<Option<Sample>>,
}

impl PresenceFeed {
    pub fn new(staleness: Duration) -> Self {
        PresenceFeed {
            staleness,
            latest: Mutex::new(None),
        }
    }

    /// Records a client-reported sample, replacing the previous one.
    pub fn report(&self, outcome: Result<bool, PresenceError>) {
        let mut latest = self.latest.lock().unwrap();
        *latest = Some(Sample {
            outcome,
            at: Instant::now(),
        });
    }

}

#[async_trait]
impl PresenceSignal for PresenceFeed {
    async fn check_presence(&self) -> Result<bool, PresenceError> {
        let latest = self.latest.lock().unwrap();
        match *latest {
            Some(sample) if sample.at.elapsed() <= self.staleness => sample.outcome,
            // No sample yet, or the client stopped reporting.
            _ => Err(PresenceError::DeviceUnavailable),
        }
    }
}
