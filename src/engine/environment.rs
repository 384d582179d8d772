// src/engine/environment.rs

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvironmentError {
    /// The host environment refused or has not confirmed fullscreen.
    FullscreenDenied,
}

impl fmt::Display for EnvironmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvironmentError::FullscreenDenied => f.write_str("fullscreen required"),
        }
    }
}

/// The host environment's exclusive resources: the fullscreen lock and
/// the camera stream.
///
/// Injected into the session runtime so the state machine is testable
/// without a browser or camera. Release operations are idempotent; the
/// runtime guarantees it dispatches them at most once per session.
#[async_trait]
pub trait ExamEnvironment: Send + Sync {
    /// Acquires the fullscreen lock. Failure must abort the transition
    /// into the monitored phase.
    async fn acquire_fullscreen(&self) -> Result<(), EnvironmentError>;

    async fn release_fullscreen(&self);

    async fn stop_camera(&self);

    fn fullscreen_held(&self) -> bool;

    fn camera_active(&self) -> bool;
}

/// Environment backed by the candidate's browser.
///
/// The client owns the real resources and mirrors this state: it reports
/// fullscreen changes in, and reads the held/active flags back from the
/// session view as directives (drop fullscreen, stop the camera stream).
#[derive(Debug, Default)]
pub struct ClientEnvironment {
    /// Latest client-reported fullscreen state.
    fullscreen_reported: AtomicBool,
    /// Whether the session currently holds the fullscreen lock.
    fullscreen_held: AtomicBool,
    camera_active: AtomicBool,
}

impl ClientEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a client-reported fullscreen state edge.
    pub fn note_fullscreen(&self, active: bool) {
        self.fullscreen_reported.store(active, Ordering::SeqCst);
        if !active {
            self.fullscreen_held.store(false, Ordering::SeqCst);
        }
    }

    /// Records that the client's camera stream is up and sampling.
    pub fn note_camera_started(&self) {
        self.camera_active.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ExamEnvironment for ClientEnvironment {
    async fn acquire_fullscreen(&self) -> Result<(), EnvironmentError> {
        // The client must have entered fullscreen before asking to start.
        if self.fullscreen_reported.load(Ordering::SeqCst) {
            self.fullscreen_held.store(true, Ordering::SeqCst);
            Ok(())
        } else {
            Err(EnvironmentError::FullscreenDenied)
        }
    }

    async fn release_fullscreen(&self) {
        self.fullscreen_held.store(false, Ordering::SeqCst);
        self.fullscreen_reported.store(false, Ordering::SeqCst);
    }

    async fn stop_camera(&self) {
        self.camera_active.store(false, Ordering::SeqCst);
    }

    fn fullscreen_held(&self) -> bool {
        self.fullscreen_held.load(Ordering::SeqCst)
    }

    fn camera_active(&self) -> bool {
        self.camera_active.load(Ordering::SeqCst)
    }
}
