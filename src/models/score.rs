// src/models/score.rs

use serde::{Deserialize, Serialize};

/// Per-group score line, one per question group of the exam.
///
/// Derived exactly once when a session completes; the full score report
/// handed to the results sink is the list of these, tagged with the
/// candidate's identifier triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupScore {
    pub group_id: i64,

    /// Number of questions in the group.
    pub total: i64,

    /// Number of questions answered with the correct option. Unanswered
    /// questions count against `total` but never against `correct`.
    pub correct: i64,
}
