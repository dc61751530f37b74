// src/store/mod.rs

//! Persistence seam.
//!
//! Every core operation opens one [`UnitOfWork`], performs its reads and
//! writes through it, and commits once. Dropping a unit of work without
//! committing discards everything it wrote.

pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    error::AppError,
    models::{
        attempt::{AttemptSession, NewResponse, ResponseRecord},
        content::{ContentItem, NewContentItem},
        course::Course,
        exam::Exam,
        question::Question,
        topic::Topic,
    },
};

pub use postgres::PgStore;

/// A sibling scope whose members carry a dense `sort_order`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Topics of a course.
    Course(i64),
    /// Items of a topic.
    Topic(i64),
}

/// Inclusive range of order values; `to: None` means open-ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderRange {
    pub from: i32,
    pub to: Option<i32>,
}

impl OrderRange {
    pub fn from(from: i32) -> Self {
        Self { from, to: None }
    }

    pub fn between(from: i32, to: i32) -> Self {
        Self { from, to: Some(to) }
    }

    pub fn contains(&self, order: i32) -> bool {
        order >= self.from && self.to.is_none_or(|to| order <= to)
    }
}

/// Opens transactions.
#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, AppError>;
}

/// One all-or-nothing transaction.
#[async_trait]
pub trait UnitOfWork: Send {
    // Courses
    async fn find_course(&mut self, course_id: i64) -> Result<Option<Course>, AppError>;
    async fn is_enrolled(&mut self, course_id: i64, student_id: i64) -> Result<bool, AppError>;
    /// Returns false when the student was already enrolled.
    async fn enroll(&mut self, course_id: i64, student_id: i64) -> Result<bool, AppError>;

    // Ordering shared by topics and items
    /// Highest `sort_order` in the scope, 0 when empty.
    async fn max_order(&mut self, scope: Scope) -> Result<i32, AppError>;
    /// Adds `delta` to the order of every member of `scope` inside `range`.
    async fn shift_orders(
        &mut self,
        scope: Scope,
        range: OrderRange,
        delta: i32,
    ) -> Result<u64, AppError>;

    // Topics
    async fn find_topic(&mut self, topic_id: i64) -> Result<Option<Topic>, AppError>;
    /// Topics of a course sorted by order.
    async fn list_topics(&mut self, course_id: i64) -> Result<Vec<Topic>, AppError>;
    async fn insert_topic(
        &mut self,
        course_id: i64,
        title: &str,
        description: Option<&str>,
        sort_order: i32,
    ) -> Result<Topic, AppError>;
    async fn set_topic_order(&mut self, topic_id: i64, sort_order: i32) -> Result<(), AppError>;
    /// Deletes the topic and its items.
    async fn delete_topic(&mut self, topic_id: i64) -> Result<(), AppError>;

    // Content items
    async fn find_item(&mut self, item_id: i64) -> Result<Option<ContentItem>, AppError>;
    /// Items of a topic sorted by order.
    async fn list_items(&mut self, topic_id: i64) -> Result<Vec<ContentItem>, AppError>;
    async fn insert_item(
        &mut self,
        item: &NewContentItem,
        sort_order: i32,
    ) -> Result<ContentItem, AppError>;
    /// Writes title, payload, file_ref and url.
    async fn update_item(&mut self, item: &ContentItem) -> Result<(), AppError>;
    /// Sets parent topic and order in one statement.
    async fn place_item(
        &mut self,
        item_id: i64,
        topic_id: i64,
        sort_order: i32,
    ) -> Result<(), AppError>;
    async fn delete_item(&mut self, item_id: i64) -> Result<(), AppError>;

    // Exams and questions
    async fn find_exam(&mut self, exam_id: i64) -> Result<Option<Exam>, AppError>;
    async fn find_question(&mut self, question_id: i64) -> Result<Option<Question>, AppError>;
    async fn list_questions(&mut self, exam_id: i64) -> Result<Vec<Question>, AppError>;

    // Attempts
    /// Serializes attempt bookkeeping for one student until the unit of work ends.
    async fn lock_student_attempts(&mut self, student_id: i64) -> Result<(), AppError>;
    async fn count_submitted_attempts(
        &mut self,
        exam_id: i64,
        student_id: i64,
    ) -> Result<i64, AppError>;
    /// Highest attempt number ever issued, whatever its status; 0 when none.
    async fn last_attempt_number(&mut self, exam_id: i64, student_id: i64)
    -> Result<i32, AppError>;
    /// Marks in-progress attempts of the student as abandoned.
    async fn abandon_open_attempts(
        &mut self,
        exam_id: i64,
        student_id: i64,
    ) -> Result<u64, AppError>;
    async fn insert_attempt(
        &mut self,
        exam_id: i64,
        student_id: i64,
        attempt_number: i32,
        started_at: DateTime<Utc>,
    ) -> Result<AttemptSession, AppError>;
    async fn find_attempt(&mut self, attempt_id: i64) -> Result<Option<AttemptSession>, AppError>;
    /// Moves an in-progress attempt to submitted. Returns false when it was not in progress.
    async fn complete_attempt(
        &mut self,
        attempt_id: i64,
        total_score: i32,
        passed: bool,
        submitted_at: DateTime<Utc>,
    ) -> Result<bool, AppError>;
    async fn update_attempt_score(
        &mut self,
        attempt_id: i64,
        total_score: i32,
        passed: bool,
    ) -> Result<(), AppError>;

    // Responses
    /// Fails with `DuplicateSubmission` when the (question, student, exam, attempt) row exists.
    async fn insert_response(&mut self, response: &NewResponse)
    -> Result<ResponseRecord, AppError>;
    async fn find_response(&mut self, response_id: i64)
    -> Result<Option<ResponseRecord>, AppError>;
    async fn list_responses(&mut self, attempt_id: i64) -> Result<Vec<ResponseRecord>, AppError>;
    async fn grade_response(
        &mut self,
        response_id: i64,
        points_awarded: i32,
        is_correct: bool,
    ) -> Result<(), AppError>;

    async fn commit(self: Box<Self>) -> Result<(), AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_range_bounds_are_inclusive() {
        let range = OrderRange::between(2, 4);
        assert!(!range.contains(1));
        assert!(range.contains(2));
        assert!(range.contains(4));
        assert!(!range.contains(5));

        let open = OrderRange::from(3);
        assert!(open.contains(300));
        assert!(!open.contains(2));
    }
}
