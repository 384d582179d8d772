// src/engine/scoring.rs

use std::collections::HashMap;

use crate::models::question::{OptionLabel, Question};
use crate::models::score::GroupScore;

/// Computes the per-group score report for a finished session.
///
/// * Partitions questions by group, preserving the order groups first
///   appear in the flattened question list.
/// * A question counts as correct only when an answer exists and matches
///   the question's correct option; a missing answer is just incorrect.
///
/// Pure function of (questions, answers); safe to re-run.
pub fn score_by_group(
    questions: &[Question],
    answers: &HashMap<i64, OptionLabel>,
) -> Vec<GroupScore> {
    let mut order: Vec<i64> = Vec::new();
    let mut by_group: HashMap<i64, GroupScore> = HashMap::new();

    for question in questions {
        let entry = by_group.entry(question.group_id).or_insert_with(|| {
            order.push(question.group_id);
            GroupScore {
                group_id: question.group_id,
                total: 0,
                correct: 0,
            }
        });

        entry.total += 1;
        if answers.get(&question.id) == Some(&question.correct) {
            entry.correct += 1;
        }
    }

    order
        .into_iter()
        .map(|group_id| by_group.remove(&group_id).unwrap())
        .collect()
}
