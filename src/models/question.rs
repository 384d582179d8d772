// src/models/question.rs

use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the four fixed answer options of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionLabel {
    A,
    B,
    C,
    D,
}

impl OptionLabel {
    /// Index into a question's `options` array.
    pub fn index(self) -> usize {
        match self {
            OptionLabel::A => 0,
            OptionLabel::B => 1,
            OptionLabel::C => 2,
            OptionLabel::D => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OptionLabel::A => "A",
            OptionLabel::B => "B",
            OptionLabel::C => "C",
            OptionLabel::D => "D",
        }
    }

    /// Parses a stored label. Anything outside `A`-`D` is rejected.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "A" => Some(OptionLabel::A),
            "B" => Some(OptionLabel::B),
            "C" => Some(OptionLabel::C),
            "D" => Some(OptionLabel::D),
            _ => None,
        }
    }
}

impl fmt::Display for OptionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single exam question as delivered by the content provider.
///
/// Immutable once loaded into a session. `correct` never leaves the
/// server; clients only ever see [`PublicQuestion`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,

    /// The question group this item belongs to (groups are scored
    /// independently).
    pub group_id: i64,

    pub content: String,

    /// Option texts, index-aligned with labels A-D.
    pub options: [String; 4],

    pub correct: OptionLabel,

    /// Display order within the owning group.
    pub position: i32,
}

/// DTO for sending a question to the candidate (excludes the answer key).
#[derive(Debug, Clone, Serialize)]
pub struct PublicQuestion {
    pub id: i64,
    pub group_id: i64,
    pub content: String,
    pub options: [String; 4],
}

impl From<&Question> for PublicQuestion {
    fn from(q: &Question) -> Self {
        PublicQuestion {
            id: q.id,
            group_id: q.group_id,
            content: q.content.clone(),
            options: q.options.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_parse_round_trip() {
        for s in ["A", "B", "C", "D"] {
            let label = OptionLabel::parse(s).unwrap();
            assert_eq!(label.as_str(), s);
        }
    }

    #[test]
    fn label_parse_rejects_unknown() {
        assert!(OptionLabel::parse("E").is_none());
        assert!(OptionLabel::parse("a").is_none());
        assert!(OptionLabel::parse("").is_none());
    }

    #[test]
    fn public_question_hides_answer_key() {
        let q = Question {
            id: 1,
            group_id: 7,
            content: "Which layer owns retries?".to_string(),
            options: [
                "Transport".to_string(),
                "Session".to_string(),
                "Application".to_string(),
                "Presentation".to_string(),
            ],
            correct: OptionLabel::B,
            position: 0,
        };

        let public = PublicQuestion::from(&q);
        let json = serde_json::to_value(&public).unwrap();
        assert!(json.get("correct").is_none());
        assert_eq!(json["id"], 1);
    }
}
