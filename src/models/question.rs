// src/models/question.rs

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Question type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionKind {
    SingleChoice,
    MultiChoice,
    OpenText,
    Date,
    ShortText,
}

impl QuestionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionKind::SingleChoice => "single-choice",
            QuestionKind::MultiChoice => "multi-choice",
            QuestionKind::OpenText => "open-text",
            QuestionKind::Date => "date",
            QuestionKind::ShortText => "short-text",
        }
    }
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single-choice" => Ok(QuestionKind::SingleChoice),
            "multi-choice" => Ok(QuestionKind::MultiChoice),
            "open-text" => Ok(QuestionKind::OpenText),
            "date" => Ok(QuestionKind::Date),
            "short-text" => Ok(QuestionKind::ShortText),
            other => Err(format!("unknown question kind '{other}'")),
        }
    }
}

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub exam_id: i64,
    pub kind: QuestionKind,
    pub prompt: String,
    pub points: i32,

    /// Choices shown to the student (choice kinds only).
    pub options: Vec<String>,

    /// Accepted answer(s). Compared as a set for multi-choice,
    /// the single element is used for the other auto-graded kinds.
    pub correct_answer: Vec<String>,
}

/// DTO for sending a question to the student (excludes the answer key).
#[derive(Debug, Clone, Serialize)]
pub struct PublicQuestion {
    pub id: i64,
    pub kind: QuestionKind,
    pub prompt: String,
    pub points: i32,
    pub options: Vec<String>,
}

impl From<&Question> for PublicQuestion {
    fn from(q: &Question) -> Self {
        PublicQuestion {
            id: q.id,
            kind: q.kind,
            prompt: q.prompt.clone(),
            points: q.points,
            options: q.options.clone(),
        }
    }
}
