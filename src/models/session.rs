// src/models/session.rs

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize, Serializer};
use validator::Validate;

use crate::engine::presence::PresenceError;
use crate::models::question::{OptionLabel, PublicQuestion};

/// The job posting an exam attempt belongs to.
///
/// A job id of `0` is the reserved sentinel for a refresher exam that has
/// no associated posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobRef {
    Posting(i64),
    Refresher,
}

impl JobRef {
    /// Decodes the raw wire value. Negative ids are rejected.
    pub fn from_raw(raw: i64) -> Option<Self> {
        match raw {
            0 => Some(JobRef::Refresher),
            id if id > 0 => Some(JobRef::Posting(id)),
            _ => None,
        }
    }

    pub fn raw(self) -> i64 {
        match self {
            JobRef::Posting(id) => id,
            JobRef::Refresher => 0,
        }
    }

    /// The posting id, if this attempt is tied to one.
    pub fn posting_id(self) -> Option<i64> {
        match self {
            JobRef::Posting(id) => Some(id),
            JobRef::Refresher => None,
        }
    }
}

impl Serialize for JobRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.raw())
    }
}

/// The fully resolved identifier triple of an exam attempt.
///
/// Built once from verified token claims; every component is present by
/// construction, so code past the auth boundary never re-checks ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct CandidateRef {
    pub employee_id: i64,
    pub exam_id: i64,
    pub job: JobRef,
}

impl CandidateRef {
    /// Registry key for this attempt. The triple is the session identity:
    /// a new attempt on the same triple replaces a discarded session, it
    /// never coexists with one.
    pub fn session_key(&self) -> String {
        format!("{}-{}-{}", self.employee_id, self.exam_id, self.job.raw())
    }
}

impl fmt::Display for CandidateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "employee {} exam {} job {}",
            self.employee_id,
            self.exam_id,
            self.job.raw()
        )
    }
}

/// Lifecycle phase of an exam session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Instructions,
    CameraSetup,
    InProgress,
    Completed,
    Terminated,
}

impl SessionPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionPhase::Completed | SessionPhase::Terminated)
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionPhase::Instructions => "instructions",
            SessionPhase::CameraSetup => "camera_setup",
            SessionPhase::InProgress => "in_progress",
            SessionPhase::Completed => "completed",
            SessionPhase::Terminated => "terminated",
        };
        f.write_str(s)
    }
}

/// Why a session was terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TerminationReason {
    FullscreenExited,
    TabOrWindowSwitched,
    PresenceLost,
}

impl TerminationReason {
    pub fn as_str(self) -> &'static str {
        match self {
            TerminationReason::FullscreenExited => "fullscreen-exited",
            TerminationReason::TabOrWindowSwitched => "tab-or-window-switched",
            TerminationReason::PresenceLost => "presence-lost",
        }
    }
}

/// Outcome of handing the score report to the results sink.
///
/// Failure is terminal-state metadata only; the session outcome does not
/// depend on downstream persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionOutcome {
    Delivered,
    Failed,
}

/// Read-only projection of a session for the UI layer.
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub id: String,
    pub phase: SessionPhase,

    /// The question under the cursor, visible fields only.
    pub question: Option<PublicQuestion>,
    pub cursor: usize,
    pub total_questions: usize,
    pub answers: HashMap<i64, OptionLabel>,

    /// Seconds left on the exam clock; absent before the exam starts.
    pub remaining_seconds: Option<u64>,

    /// Seconds left on an active presence grace countdown, for the
    /// candidate-facing warning. Absent when no countdown is live.
    pub grace_remaining_seconds: Option<u64>,

    /// Last detector failure, shown to the candidate as a diagnostic.
    pub presence_diagnostic: Option<PresenceError>,

    pub reason: Option<TerminationReason>,
    pub score_submission: Option<SubmissionOutcome>,

    /// Directives the client mirrors: whether the session still holds the
    /// fullscreen lock and whether the camera stream should be running.
    pub fullscreen_held: bool,
    pub camera_active: bool,
}

/// Request body for selecting an option on the current question.
#[derive(Debug, Deserialize, Validate)]
pub struct SelectAnswerRequest {
    #[validate(custom(function = validate_option_label))]
    pub selected: String,
}

fn validate_option_label(selected: &str) -> Result<(), validator::ValidationError> {
    if OptionLabel::parse(selected).is_none() {
        return Err(validator::ValidationError::new("unknown_option_label"));
    }
    Ok(())
}
