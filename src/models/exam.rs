// src/models/exam.rs

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Represents the 'exams' table in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exam {
    pub id: i64,
    pub course_id: i64,
    pub title: String,

    /// Window during which attempts may start and be submitted, end exclusive.
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,

    /// Personal time budget of one attempt.
    pub duration_minutes: i32,
    pub max_attempts: i32,
    pub passing_score: i32,
}

impl Exam {
    /// `starts_at <= now < ends_at`
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.starts_at <= now && now < self.ends_at
    }

    /// Client-side deadline for an attempt started at `started_at`; never past the window.
    pub fn deadline_for(&self, started_at: DateTime<Utc>) -> DateTime<Utc> {
        let personal = started_at + Duration::minutes(i64::from(self.duration_minutes));
        personal.min(self.ends_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn exam() -> Exam {
        Exam {
            id: 1,
            course_id: 1,
            title: "Midterm".into(),
            starts_at: Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
            ends_at: Utc.with_ymd_and_hms(2026, 3, 1, 11, 0, 0).unwrap(),
            duration_minutes: 45,
            max_attempts: 2,
            passing_score: 5,
        }
    }

    #[test]
    fn window_is_end_exclusive() {
        let exam = exam();
        assert!(exam.is_open_at(exam.starts_at));
        assert!(!exam.is_open_at(exam.ends_at));
        assert!(!exam.is_open_at(exam.starts_at - Duration::seconds(1)));
    }

    #[test]
    fn deadline_is_capped_by_window() {
        let exam = exam();
        let early = exam.starts_at;
        assert_eq!(exam.deadline_for(early), early + Duration::minutes(45));

        let late = exam.ends_at - Duration::minutes(10);
        assert_eq!(exam.deadline_for(late), exam.ends_at);
    }
}
