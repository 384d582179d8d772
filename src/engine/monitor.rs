// src/engine/monitor.rs

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval};

use crate::engine::environment::ExamEnvironment;
use crate::engine::presence::PresenceSignal;
use crate::engine::session::{
    ExamSession, HardViolation, SessionError, TickOutcome,
};
use crate::models::score::GroupScore;
use crate::models::session::{CandidateRef, SubmissionOutcome, TerminationReason};
use crate::providers::content::{ContentProvider, load_exam_questions};
use crate::providers::results::ResultsSink;

/// Timing knobs of the monitoring loop.
#[derive(Debug, Clone, Copy)]
pub struct MonitorPolicy {
    /// Hard time limit of the exam.
    pub exam_duration: Duration,
    /// How often the presence signal is polled while armed.
    pub poll_interval: Duration,
    /// Grace window for presence loss before termination.
    pub grace_period: Duration,
    /// Granularity of clock and grace-deadline checks.
    pub tick_interval: Duration,
}

impl Default for MonitorPolicy {
    fn default() -> Self {
        MonitorPolicy {
            exam_duration: Duration::from_secs(30 * 60),
            poll_interval: Duration::from_millis(1250),
            grace_period: Duration::from_secs(10),
            tick_interval: Duration::from_secs(1),
        }
    }
}

/// One hosted exam session: the state machine plus its injected
/// capabilities and collaborators.
///
/// The session mutex is the single timeline of the session. Guard events
/// from the transport, presence polls, and timer ticks all mutate the
/// machine under this one lock, so no two transitions ever interleave.
pub struct SessionRuntime {
    session: Mutex<ExamSession>,
    presence: Arc<dyn PresenceSignal>,
    env: Arc<dyn ExamEnvironment>,
    sink: Arc<dyn ResultsSink>,
    policy: MonitorPolicy,
}

impl SessionRuntime {
    pub fn new(
        candidate: CandidateRef,
        policy: MonitorPolicy,
        presence: Arc<dyn PresenceSignal>,
        env: Arc<dyn ExamEnvironment>,
        sink: Arc<dyn ResultsSink>,
    ) -> Arc<Self> {
        Arc::new(SessionRuntime {
            session: Mutex::new(ExamSession::new(
                candidate,
                policy.exam_duration,
                policy.grace_period,
            )),
            presence,
            env,
            sink,
            policy,
        })
    }

    pub async fn lock(&self) -> MutexGuard<'_, ExamSession> {
        self.session.lock().await
    }

    /// The full start transition: presence gate, question fetch,
    /// proctoring event, fullscreen acquisition, then arming.
    ///
    /// The machine is flagged start-pending for the duration, so no
    /// candidate action can interleave with the suspended steps. Any
    /// failure rolls back to `CameraSetup`; setup errors are retryable.
    pub async fn start(self: Arc<Self>, content: &dyn ContentProvider) -> Result<(), SessionError> {
        let candidate = {
            let mut session = self.lock().await;
            session.begin_start()?;
            *session.candidate()
        };

        // The latest presence check must confirm a visible face.
        let presence = self.presence.check_presence().await;
        if presence != Ok(true) {
            self.lock().await.abort_start();
            return Err(SessionError::PresenceNotConfirmed(presence.err()));
        }

        let questions = match load_exam_questions(content, candidate.exam_id).await {
            Ok(questions) => questions,
            Err(e) => {
                self.lock().await.abort_start();
                return Err(SessionError::ContentProvider(e.to_string()));
            }
        };

        // A sink failure degrades to "no event id"; the exam still runs.
        let proctoring_event_id = match self.sink.record_proctoring_start(&candidate).await {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!(
                    "Proctoring event could not be opened for {}: {}",
                    candidate,
                    e
                );
                None
            }
        };

        // Guards are only armed behind a held fullscreen lock.
        if self.env.acquire_fullscreen().await.is_err() {
            self.lock().await.abort_start();
            return Err(SessionError::FullscreenDenied);
        }

        {
            let mut session = self.lock().await;
            if let Err(e) = session.complete_start(questions, proctoring_event_id, Instant::now()) {
                drop(session);
                self.env.release_fullscreen().await;
                return Err(e);
            }
        }

        tracing::info!("Exam started for {}", candidate);
        self.clone().spawn_monitor();
        Ok(())
    }

    /// Spawns the armed watcher loop: a timer tick for the exam clock and
    /// the grace deadline, and a slower presence poll. Exits as soon as
    /// the session is terminal.
    fn spawn_monitor(self: Arc<Self>) -> JoinHandle<()> {
        let policy = self.policy;
        tokio::spawn(async move {
            let mut tick = interval(policy.tick_interval);
            let mut poll = interval(policy.poll_interval);

            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        let outcome = {
                            let mut session = self.session.lock().await;
                            if session.is_terminal() {
                                break;
                            }
                            session.tick(Instant::now())
                        };
                        match outcome {
                            TickOutcome::Idle => {}
                            TickOutcome::Completed(report) => {
                                tracing::info!("Exam clock expired; forcing submit");
                                self.finish_completed(report).await;
                                break;
                            }
                            TickOutcome::Terminated(reason) => {
                                tracing::warn!("Session terminated: {}", reason.as_str());
                                self.release_resources().await;
                                break;
                            }
                        }
                    }
                    _ = poll.tick() => {
                        let outcome = self.presence.check_presence().await;
                        let decision = {
                            let mut session = self.session.lock().await;
                            if session.is_terminal() {
                                break;
                            }
                            session.presence_update(outcome, Instant::now())
                        };
                        if let Some(reason) = decision {
                            tracing::warn!("Session terminated: {}", reason.as_str());
                            self.release_resources().await;
                            break;
                        }
                    }
                }
            }
        })
    }

    /// Candidate-initiated submit from the last question.
    pub async fn submit(&self) -> Result<(), SessionError> {
        let report = {
            let mut session = self.lock().await;
            session.submit(Instant::now())?
        };
        self.finish_completed(report).await;
        Ok(())
    }

    /// A hard violation edge reported by the transport. Returns the
    /// termination it caused, if the guard was armed.
    pub async fn report_hard_violation(
        &self,
        violation: HardViolation,
    ) -> Option<TerminationReason> {
        let decision = {
            let mut session = self.lock().await;
            session.hard_violation(violation, Instant::now())
        };
        if let Some(reason) = decision {
            tracing::warn!("Session terminated: {}", reason.as_str());
            self.release_resources().await;
        }
        decision
    }

    /// Terminal bookkeeping for a completed session: release the
    /// environment, then hand the report to the results sink. Submission
    /// failure is recorded and logged; it never reopens the session.
    async fn finish_completed(&self, report: Vec<GroupScore>) {
        self.release_resources().await;

        let (candidate, proctoring_event_id) = {
            let session = self.lock().await;
            (*session.candidate(), session.proctoring_event_id())
        };

        let outcome = match self
            .sink
            .submit_scores(&candidate, proctoring_event_id, &report)
            .await
        {
            Ok(()) => SubmissionOutcome::Delivered,
            Err(e) => {
                tracing::error!("Score submission failed for {}: {}", candidate, e);
                SubmissionOutcome::Failed
            }
        };

        self.lock().await.set_score_submission(outcome);
    }

    /// Releases the fullscreen lock and camera stream. The machine hands
    /// out the release claim exactly once, so every terminal path can call
    /// this without double-releasing.
    async fn release_resources(&self) {
        let claimed = {
            let mut session = self.lock().await;
            session.take_resource_release()
        };
        if claimed {
            self.env.release_fullscreen().await;
            self.env.stop_camera().await;
        }
    }
}
