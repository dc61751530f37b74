// src/models/attempt.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use validator::Validate;

use crate::models::question::PublicQuestion;

/// Lifecycle of one attempt. `Submitted` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    InProgress,
    Submitted,
    /// Superseded by a newer attempt before being submitted.
    Abandoned,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::InProgress => "in_progress",
            AttemptStatus::Submitted => "submitted",
            AttemptStatus::Abandoned => "abandoned",
        }
    }
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttemptStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(AttemptStatus::InProgress),
            "submitted" => Ok(AttemptStatus::Submitted),
            "abandoned" => Ok(AttemptStatus::Abandoned),
            other => Err(format!("unknown attempt status '{other}'")),
        }
    }
}

/// Represents the 'exam_sessions' table: one row per attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptSession {
    pub id: i64,
    pub exam_id: i64,
    pub student_id: i64,
    pub attempt_number: i32,
    pub status: AttemptStatus,
    pub started_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub total_score: Option<i32>,
    pub passed: Option<bool>,
}

/// A raw answer: a single string or a set of selected options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    Text(String),
    Choices(Vec<String>),
}

impl Answer {
    pub fn empty() -> Self {
        Answer::Text(String::new())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Answer::Text(text) => text.is_empty(),
            Answer::Choices(choices) => choices.is_empty(),
        }
    }
}

/// Represents the 'exam_attempts' table: one graded response per question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub id: i64,
    pub attempt_id: i64,
    pub question_id: i64,
    pub student_id: i64,
    pub exam_id: i64,
    pub attempt_number: i32,
    pub response: Answer,

    /// `None` while awaiting manual review.
    pub is_correct: Option<bool>,
    pub points_awarded: Option<i32>,
}

/// Insert-ready values for a response row.
#[derive(Debug, Clone)]
pub struct NewResponse {
    pub attempt_id: i64,
    pub question_id: i64,
    pub student_id: i64,
    pub exam_id: i64,
    pub attempt_number: i32,
    pub response: Answer,
    pub is_correct: Option<bool>,
    pub points_awarded: Option<i32>,
}

/// DTO returned when an attempt starts.
#[derive(Debug, Serialize)]
pub struct StartedAttempt {
    pub attempt_id: i64,
    pub attempt_number: i32,
    pub started_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    pub questions: Vec<PublicQuestion>,
}

/// DTO for submitting an attempt.
#[derive(Debug, Deserialize)]
pub struct SubmitAttemptRequest {
    /// Key: Question ID, Value: the student's answer.
    #[serde(default)]
    pub answers: HashMap<i64, Answer>,
}

/// Per-question outcome reported back to the student.
#[derive(Debug, Clone, Serialize)]
pub struct QuestionResult {
    pub question_id: i64,
    pub is_correct: Option<bool>,
    pub points_awarded: Option<i32>,
}

/// DTO returned after a successful submission.
#[derive(Debug, Serialize)]
pub struct SubmissionResult {
    pub attempt_id: i64,
    pub attempt_number: i32,
    pub total_score: i32,
    pub max_score: i32,
    pub passed: bool,
    /// Open-text responses waiting for a teacher.
    pub pending_review: usize,
    pub results: Vec<QuestionResult>,
}

/// DTO for recording a manual grade.
#[derive(Debug, Deserialize, Validate)]
pub struct GradeRequest {
    #[validate(range(min = 0))]
    pub points: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answers_accept_strings_and_lists() {
        let text: Answer = serde_json::from_str(r#""B""#).unwrap();
        assert_eq!(text, Answer::Text("B".into()));

        let set: Answer = serde_json::from_str(r#"["A","C"]"#).unwrap();
        assert_eq!(set, Answer::Choices(vec!["A".into(), "C".into()]));
    }

    #[test]
    fn submit_request_keys_are_question_ids() {
        let req: SubmitAttemptRequest =
            serde_json::from_str(r#"{"answers":{"7":"x","9":["a","b"]}}"#).unwrap();
        assert_eq!(req.answers.get(&7), Some(&Answer::Text("x".into())));
        assert!(matches!(req.answers.get(&9), Some(Answer::Choices(c)) if c.len() == 2));
    }
}
