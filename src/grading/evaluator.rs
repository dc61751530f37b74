// src/grading/evaluator.rs

use std::collections::HashSet;

use crate::models::{
    attempt::Answer,
    question::{Question, QuestionKind},
};

/// Outcome of grading one response. Both fields are `None` while awaiting manual review.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    pub is_correct: Option<bool>,
    pub points_awarded: Option<i32>,
}

impl Evaluation {
    fn graded(is_correct: bool, points: i32) -> Self {
        Evaluation {
            is_correct: Some(is_correct),
            points_awarded: Some(if is_correct { points } else { 0 }),
        }
    }

    pub fn ungraded() -> Self {
        Evaluation {
            is_correct: None,
            points_awarded: None,
        }
    }
}

/// Grades one response against its question.
///
/// * Open-text is never auto-graded.
/// * Multi-choice compares sets: order and repetition are irrelevant.
/// * The other kinds require an exact, case-sensitive match.
/// * An empty response is always incorrect.
pub fn evaluate(question: &Question, response: &Answer) -> Evaluation {
    let is_correct = match question.kind {
        QuestionKind::OpenText => return Evaluation::ungraded(),
        _ if response.is_empty() => false,
        QuestionKind::MultiChoice => matches_set(&question.correct_answer, response),
        QuestionKind::SingleChoice | QuestionKind::Date | QuestionKind::ShortText => {
            matches_exact(&question.correct_answer, response)
        }
    };

    Evaluation::graded(is_correct, question.points)
}

fn matches_exact(correct: &[String], response: &Answer) -> bool {
    let submitted = match response {
        Answer::Text(text) => text.as_str(),
        // A one-element selection is the same as the bare value.
        Answer::Choices(choices) if choices.len() == 1 => choices[0].as_str(),
        Answer::Choices(_) => return false,
    };

    matches!(correct, [expected] if expected == submitted)
}

fn matches_set(correct: &[String], response: &Answer) -> bool {
    let submitted: HashSet<&str> = match response {
        Answer::Text(text) => HashSet::from([text.as_str()]),
        Answer::Choices(choices) => choices.iter().map(String::as_str).collect(),
    };
    let expected: HashSet<&str> = correct.iter().map(String::as_str).collect();

    submitted.symmetric_difference(&expected).next().is_none()
}
