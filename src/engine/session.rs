// src/engine/session.rs

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

use crate::engine::countdown::Countdown;
use crate::engine::debounce::ViolationDebouncer;
use crate::engine::presence::PresenceError;
use crate::engine::scoring::score_by_group;
use crate::models::question::{OptionLabel, PublicQuestion, Question};
use crate::models::score::GroupScore;
use crate::models::session::{
    CandidateRef, SessionPhase, SessionView, SubmissionOutcome, TerminationReason,
};

/// Errors produced by session transitions and candidate actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The action is not legal in the session's current phase.
    InvalidPhase {
        action: &'static str,
        phase: SessionPhase,
    },

    /// A start transition is suspended on its async steps; no candidate
    /// interaction is accepted until it resolves.
    StartInFlight,

    /// The latest presence check did not confirm a visible face.
    PresenceNotConfirmed(Option<PresenceError>),

    /// The host environment refused the fullscreen request.
    FullscreenDenied,

    /// The content provider failed to deliver the question set.
    ContentProvider(String),

    /// The content provider delivered an empty question set.
    NoQuestions,

    /// Forward progress requires an answer on the current question.
    AnswerRequired,

    /// Submit is only enabled on the last question.
    NotLastQuestion,

    /// A session cannot be cancelled once monitoring has started.
    CancelWhileInProgress,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::InvalidPhase { action, phase } => {
                write!(f, "action '{}' is not allowed in phase '{}'", action, phase)
            }
            SessionError::StartInFlight => write!(f, "exam start is already in progress"),
            SessionError::PresenceNotConfirmed(Some(e)) => {
                write!(f, "face not confirmed: {}", e)
            }
            SessionError::PresenceNotConfirmed(None) => write!(f, "face not visible"),
            SessionError::FullscreenDenied => write!(f, "fullscreen required"),
            SessionError::ContentProvider(msg) => write!(f, "failed to load exam: {}", msg),
            SessionError::NoQuestions => write!(f, "exam has no questions"),
            SessionError::AnswerRequired => {
                write!(f, "the current question must be answered first")
            }
            SessionError::NotLastQuestion => {
                write!(f, "submit is only available on the last question")
            }
            SessionError::CancelWhileInProgress => {
                write!(f, "a running exam cannot be cancelled")
            }
        }
    }
}

impl std::error::Error for SessionError {}

/// Integrity violations that terminate a session on first occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardViolation {
    FullscreenExited,
    Backgrounded,
}

impl HardViolation {
    fn reason(self) -> TerminationReason {
        match self {
            HardViolation::FullscreenExited => TerminationReason::FullscreenExited,
            HardViolation::Backgrounded => TerminationReason::TabOrWindowSwitched,
        }
    }
}

/// What a timer tick decided.
#[derive(Debug, PartialEq, Eq)]
pub enum TickOutcome {
    Idle,
    /// The exam clock ran out; the session was force-submitted with the
    /// answers it had.
    Completed(Vec<GroupScore>),
    /// A presence grace countdown expired without recovery.
    Terminated(TerminationReason),
}

/// The exam session aggregate: owns the question set, the answer sheet,
/// the cursor, the clock, and the violation policy state.
///
/// All mutation goes through the transition methods below; the runtime
/// serializes calls so events are processed strictly one at a time. The
/// session never leaves `Completed` or `Terminated`, and every guard is
/// disarmed inside the same mutation that makes a phase terminal.
#[derive(Debug)]
pub struct ExamSession {
    candidate: CandidateRef,
    phase: SessionPhase,
    questions: Vec<Question>,
    answers: HashMap<i64, OptionLabel>,
    cursor: usize,
    exam_duration: Duration,
    countdown: Option<Countdown>,
    /// Remaining time captured at the terminal transition.
    frozen_remaining: Option<Duration>,
    debouncer: ViolationDebouncer,
    armed: bool,
    start_pending: bool,
    reason: Option<TerminationReason>,
    proctoring_event_id: Option<i64>,
    score_submission: Option<SubmissionOutcome>,
    presence_diagnostic: Option<PresenceError>,
    resources_released: bool,
}

impl ExamSession {
    pub fn new(candidate: CandidateRef, exam_duration: Duration, grace: Duration) -> Self {
        ExamSession {
            candidate,
            phase: SessionPhase::Instructions,
            questions: Vec::new(),
            answers: HashMap::new(),
            cursor: 0,
            exam_duration,
            countdown: None,
            frozen_remaining: None,
            debouncer: ViolationDebouncer::new(grace),
            armed: false,
            start_pending: false,
            reason: None,
            proctoring_event_id: None,
            score_submission: None,
            presence_diagnostic: None,
            resources_released: false,
        }
    }

    pub fn candidate(&self) -> &CandidateRef {
        &self.candidate
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn reason(&self) -> Option<TerminationReason> {
        self.reason
    }

    pub fn proctoring_event_id(&self) -> Option<i64> {
        self.proctoring_event_id
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.cursor)
    }

    fn guard_action(&self, action: &'static str, expected: SessionPhase) -> Result<(), SessionError> {
        if self.start_pending {
            return Err(SessionError::StartInFlight);
        }
        if self.phase != expected {
            return Err(SessionError::InvalidPhase {
                action,
                phase: self.phase,
            });
        }
        Ok(())
    }

    /// `Instructions -> CameraSetup` on the candidate's "proceed".
    pub fn proceed(&mut self) -> Result<(), SessionError> {
        self.guard_action("proceed", SessionPhase::Instructions)?;
        self.phase = SessionPhase::CameraSetup;
        Ok(())
    }

    /// Marks the start transition as suspended on its async steps
    /// (question fetch, fullscreen acquisition). While pending, every
    /// candidate action is rejected.
    pub fn begin_start(&mut self) -> Result<(), SessionError> {
        self.guard_action("start", SessionPhase::CameraSetup)?;
        self.start_pending = true;
        Ok(())
    }

    /// Rolls back a start whose async steps failed. The session stays in
    /// `CameraSetup`; setup errors are retryable.
    pub fn abort_start(&mut self) {
        self.start_pending = false;
    }

    /// `CameraSetup -> InProgress` once questions are loaded and the
    /// fullscreen lock is held. Arms the guards and starts the clock.
    pub fn complete_start(
        &mut self,
        questions: Vec<Question>,
        proctoring_event_id: Option<i64>,
        now: Instant,
    ) -> Result<(), SessionError> {
        debug_assert!(self.start_pending);
        self.start_pending = false;

        if self.phase != SessionPhase::CameraSetup {
            return Err(SessionError::InvalidPhase {
                action: "start",
                phase: self.phase,
            });
        }
        if questions.is_empty() {
            return Err(SessionError::NoQuestions);
        }

        self.questions = questions;
        self.cursor = 0;
        self.answers.clear();
        self.proctoring_event_id = proctoring_event_id;
        self.countdown = Some(Countdown::start(self.exam_duration, now));
        self.armed = true;
        self.phase = SessionPhase::InProgress;
        Ok(())
    }

    /// Records the candidate's option choice for the current question.
    /// Re-selection overwrites; answers are never removed.
    pub fn select_answer(&mut self, selected: OptionLabel) -> Result<(), SessionError> {
        self.guard_action("answer", SessionPhase::InProgress)?;
        let question_id = self
            .current_question()
            .map(|q| q.id)
            .expect("in-progress session has a question under the cursor");
        self.answers.insert(question_id, selected);
        Ok(())
    }

    /// Moves the cursor forward. Requires the current question answered.
    pub fn next(&mut self) -> Result<(), SessionError> {
        self.guard_action("next", SessionPhase::InProgress)?;
        let current = self
            .current_question()
            .expect("in-progress session has a question under the cursor");
        if !self.answers.contains_key(&current.id) {
            return Err(SessionError::AnswerRequired);
        }
        if self.cursor + 1 < self.questions.len() {
            self.cursor += 1;
        }
        Ok(())
    }

    /// Moves the cursor backward; never requires an answer.
    pub fn previous(&mut self) -> Result<(), SessionError> {
        self.guard_action("previous", SessionPhase::InProgress)?;
        self.cursor = self.cursor.saturating_sub(1);
        Ok(())
    }

    /// Candidate-initiated submit from the last question.
    pub fn submit(&mut self, now: Instant) -> Result<Vec<GroupScore>, SessionError> {
        self.guard_action("submit", SessionPhase::InProgress)?;
        if self.cursor + 1 != self.questions.len() {
            return Err(SessionError::NotLastQuestion);
        }
        let last = self
            .current_question()
            .expect("in-progress session has a question under the cursor");
        if !self.answers.contains_key(&last.id) {
            return Err(SessionError::AnswerRequired);
        }
        Ok(self.complete(now))
    }

    /// Applies a hard violation. Returns the termination reason when the
    /// event was consumed; disarmed and terminal sessions ignore it.
    pub fn hard_violation(
        &mut self,
        violation: HardViolation,
        now: Instant,
    ) -> Option<TerminationReason> {
        if !self.armed || self.phase != SessionPhase::InProgress {
            return None;
        }
        let reason = violation.reason();
        self.terminate(reason, now);
        Some(reason)
    }

    /// Applies one presence poll result. Detector failures count as an
    /// absent face; the failure kind is kept for the diagnostic view.
    pub fn presence_update(
        &mut self,
        outcome: Result<bool, PresenceError>,
        now: Instant,
    ) -> Option<TerminationReason> {
        if !self.armed || self.phase != SessionPhase::InProgress {
            return None;
        }

        let present = match outcome {
            Ok(present) => {
                self.presence_diagnostic = None;
                present
            }
            Err(e) => {
                self.presence_diagnostic = Some(e);
                false
            }
        };

        let decision = self.debouncer.observe_presence(present, now);
        if let Some(reason) = decision {
            self.terminate(reason, now);
        }
        decision
    }

    /// One timer tick: checks the exam clock and the grace deadline.
    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        if !self.armed || self.phase != SessionPhase::InProgress {
            return TickOutcome::Idle;
        }

        let expired = self
            .countdown
            .map(|c| c.expired(now))
            .unwrap_or(false);
        if expired {
            // Timer zero forces a submit with whatever answers exist.
            return TickOutcome::Completed(self.complete(now));
        }

        if let Some(reason) = self.debouncer.poll_deadline(now) {
            self.terminate(reason, now);
            return TickOutcome::Terminated(reason);
        }

        TickOutcome::Idle
    }

    fn complete(&mut self, now: Instant) -> Vec<GroupScore> {
        let report = score_by_group(&self.questions, &self.answers);
        self.close(SessionPhase::Completed, now);
        report
    }

    fn terminate(&mut self, reason: TerminationReason, now: Instant) {
        self.reason = Some(reason);
        self.close(SessionPhase::Terminated, now);
    }

    /// Disarms every guard and freezes the clock, then moves to the
    /// terminal phase. Disarming happens inside the same mutation so no
    /// guard event can be attributed after the phase change is visible.
    fn close(&mut self, phase: SessionPhase, now: Instant) {
        self.armed = false;
        self.frozen_remaining = Some(
            self.countdown
                .map(|c| c.remaining(now))
                .unwrap_or(Duration::ZERO),
        );
        self.phase = phase;
    }

    /// Claims the one-shot right to release the environment resources.
    /// Returns `true` exactly once per session.
    pub fn take_resource_release(&mut self) -> bool {
        if self.resources_released {
            return false;
        }
        self.resources_released = true;
        true
    }

    pub fn set_score_submission(&mut self, outcome: SubmissionOutcome) {
        self.score_submission = Some(outcome);
    }

    /// Whether the session may be discarded by the candidate: before
    /// monitoring starts, or after it has ended. Never while running.
    pub fn can_discard(&self) -> Result<(), SessionError> {
        if self.phase == SessionPhase::InProgress || self.start_pending {
            return Err(SessionError::CancelWhileInProgress);
        }
        Ok(())
    }

    /// Read-only projection for the UI layer.
    pub fn view(
        &self,
        id: &str,
        now: Instant,
        fullscreen_held: bool,
        camera_active: bool,
    ) -> SessionView {
        let remaining = match self.phase {
            SessionPhase::InProgress => self.countdown.map(|c| c.remaining(now)),
            _ => self.frozen_remaining,
        };

        SessionView {
            id: id.to_string(),
            phase: self.phase,
            question: self.current_question().map(PublicQuestion::from),
            cursor: self.cursor,
            total_questions: self.questions.len(),
            answers: self.answers.clone(),
            remaining_seconds: remaining.map(|d| d.as_secs()),
            grace_remaining_seconds: self
                .debouncer
                .grace_remaining(now)
                .map(|d| d.as_secs()),
            presence_diagnostic: self.presence_diagnostic,
            reason: self.reason,
            score_submission: self.score_submission,
            fullscreen_held,
            camera_active,
        }
    }
}
