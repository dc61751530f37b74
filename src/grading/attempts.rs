// src/grading/attempts.rs

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;

use crate::{
    access::{owned_course, readable_course},
    error::AppError,
    grading::evaluator::{Evaluation, evaluate},
    models::{
        attempt::{
            Answer, AttemptStatus, NewResponse, QuestionResult, ResponseRecord, StartedAttempt,
            SubmissionResult,
        },
        exam::Exam,
        question::{PublicQuestion, Question, QuestionKind},
        user::{AuthContext, Role},
    },
    services::{
        directory::UserDirectory,
        notify::{Notifier, Template, send_best_effort},
    },
    store::{Store, UnitOfWork},
};

/// Scored submission before it is persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredAnswers {
    pub graded: Vec<(i64, Answer, Evaluation)>,
    pub total_score: i32,
    pub max_score: i32,
    pub pending_review: usize,
}

/// Evaluates every question; questions without an answer are graded as empty.
/// Answers to questions outside the exam are ignored.
pub fn score_answers(questions: &[Question], answers: &HashMap<i64, Answer>) -> ScoredAnswers {
    let mut graded = Vec::with_capacity(questions.len());
    let mut total_score = 0;
    let mut max_score = 0;
    let mut pending_review = 0;

    for question in questions {
        let answer = answers.get(&question.id).cloned().unwrap_or_else(Answer::empty);
        let evaluation = evaluate(question, &answer);

        max_score += question.points;
        match evaluation.points_awarded {
            Some(points) => total_score += points,
            None => pending_review += 1,
        }
        graded.push((question.id, answer, evaluation));
    }

    ScoredAnswers {
        graded,
        total_score,
        max_score,
        pending_review,
    }
}

async fn ensure_quota_left(
    uow: &mut dyn UnitOfWork,
    exam: &Exam,
    student_id: i64,
) -> Result<(), AppError> {
    let taken = uow.count_submitted_attempts(exam.id, student_id).await?;
    if taken >= i64::from(exam.max_attempts) {
        return Err(AppError::AttemptNotAllowed(format!(
            "All {} attempts have been used",
            exam.max_attempts
        )));
    }
    Ok(())
}

/// Runs timed exam attempts: start, submit, count, and manual grading.
#[derive(Clone)]
pub struct ExamEngine {
    store: Arc<dyn Store>,
    directory: Arc<dyn UserDirectory>,
    notifier: Arc<dyn Notifier>,
}

impl ExamEngine {
    pub fn new(
        store: Arc<dyn Store>,
        directory: Arc<dyn UserDirectory>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            directory,
            notifier,
        }
    }

    /// NotStarted -> InProgress.
    ///
    /// Requires the exam window to be open and fewer than `max_attempts`
    /// submitted attempts. An older attempt still in progress is abandoned.
    pub async fn start_attempt(
        &self,
        ctx: &AuthContext,
        exam_id: i64,
        now: DateTime<Utc>,
    ) -> Result<StartedAttempt, AppError> {
        if ctx.role != Role::Student {
            return Err(AppError::Forbidden(
                "Only students can take exams".to_string(),
            ));
        }

        let mut uow = self.store.begin().await?;

        let exam = uow
            .find_exam(exam_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Exam not found".to_string()))?;
        readable_course(uow.as_mut(), ctx, exam.course_id).await?;

        if !exam.is_open_at(now) {
            return Err(AppError::AttemptNotAllowed(
                "The exam is not open".to_string(),
            ));
        }

        uow.lock_student_attempts(ctx.user_id).await?;
        ensure_quota_left(uow.as_mut(), &exam, ctx.user_id).await?;

        let abandoned = uow.abandon_open_attempts(exam.id, ctx.user_id).await?;
        let attempt_number = uow.last_attempt_number(exam.id, ctx.user_id).await? + 1;
        let attempt = uow
            .insert_attempt(exam.id, ctx.user_id, attempt_number, now)
            .await?;
        let questions = uow.list_questions(exam.id).await?;

        uow.commit().await?;

        tracing::info!(
            exam_id,
            student_id = ctx.user_id,
            attempt_number,
            abandoned,
            "Attempt started"
        );

        Ok(StartedAttempt {
            attempt_id: attempt.id,
            attempt_number,
            started_at: now,
            deadline: exam.deadline_for(now),
            questions: questions.iter().map(PublicQuestion::from).collect(),
        })
    }

    /// InProgress -> Submitted.
    ///
    /// All response rows and the aggregate are written in one transaction.
    pub async fn submit_attempt(
        &self,
        ctx: &AuthContext,
        attempt_id: i64,
        answers: &HashMap<i64, Answer>,
        now: DateTime<Utc>,
    ) -> Result<SubmissionResult, AppError> {
        let mut uow = self.store.begin().await?;
        uow.lock_student_attempts(ctx.user_id).await?;

        let attempt = uow
            .find_attempt(attempt_id)
            .await?
            .filter(|attempt| attempt.student_id == ctx.user_id)
            .ok_or_else(|| AppError::NotFound("Attempt not found".to_string()))?;

        match attempt.status {
            AttemptStatus::InProgress => {}
            AttemptStatus::Submitted => return Err(AppError::DuplicateSubmission),
            AttemptStatus::Abandoned => {
                return Err(AppError::AttemptNotAllowed(
                    "This attempt was replaced by a newer one".to_string(),
                ));
            }
        }

        let exam = uow
            .find_exam(attempt.exam_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Exam not found".to_string()))?;

        if !exam.is_open_at(now) {
            tracing::info!(attempt_id, exam_id = exam.id, "Late submission rejected");
            return Err(AppError::AttemptWindowClosed);
        }
        // Another attempt may have been submitted since this one started.
        ensure_quota_left(uow.as_mut(), &exam, attempt.student_id).await?;

        let questions = uow.list_questions(exam.id).await?;
        let scored = score_answers(&questions, answers);
        let passed = scored.total_score >= exam.passing_score;

        let mut results = Vec::with_capacity(scored.graded.len());
        for (question_id, answer, evaluation) in &scored.graded {
            uow.insert_response(&NewResponse {
                attempt_id: attempt.id,
                question_id: *question_id,
                student_id: attempt.student_id,
                exam_id: exam.id,
                attempt_number: attempt.attempt_number,
                response: answer.clone(),
                is_correct: evaluation.is_correct,
                points_awarded: evaluation.points_awarded,
            })
            .await?;

            results.push(QuestionResult {
                question_id: *question_id,
                is_correct: evaluation.is_correct,
                points_awarded: evaluation.points_awarded,
            });
        }

        if !uow
            .complete_attempt(attempt.id, scored.total_score, passed, now)
            .await?
        {
            return Err(AppError::DuplicateSubmission);
        }

        uow.commit().await?;

        tracing::info!(
            attempt_id,
            exam_id = exam.id,
            student_id = attempt.student_id,
            total_score = scored.total_score,
            passed,
            "Attempt submitted"
        );

        self.notify_student(
            attempt.student_id,
            Template::ExamSubmitted,
            json!({
                "exam": exam.title,
                "attempt_number": attempt.attempt_number,
                "total_score": scored.total_score,
                "max_score": scored.max_score,
                "passed": passed,
                "pending_review": scored.pending_review,
            }),
        )
        .await;

        Ok(SubmissionResult {
            attempt_id: attempt.id,
            attempt_number: attempt.attempt_number,
            total_score: scored.total_score,
            max_score: scored.max_score,
            passed,
            pending_review: scored.pending_review,
            results,
        })
    }

    /// Number of submitted attempts; abandoned and in-progress ones do not count.
    ///
    /// Students may read their own count for a course they are enrolled in.
    /// Teachers and admins may read any student's count for a course they own.
    pub async fn attempts_taken(
        &self,
        ctx: &AuthContext,
        student_id: i64,
        exam_id: i64,
    ) -> Result<i64, AppError> {
        if ctx.role == Role::Student && student_id != ctx.user_id {
            return Err(AppError::Forbidden(
                "Students can only see their own attempts".to_string(),
            ));
        }

        let mut uow = self.store.begin().await?;
        let exam = uow
            .find_exam(exam_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Exam not found".to_string()))?;
        if ctx.role == Role::Student {
            readable_course(uow.as_mut(), ctx, exam.course_id).await?;
        } else {
            owned_course(uow.as_mut(), ctx, exam.course_id).await?;
        }

        uow.count_submitted_attempts(exam.id, student_id).await
    }

    /// Records a teacher's grade for an open-text response and refreshes the attempt total.
    pub async fn grade_response(
        &self,
        ctx: &AuthContext,
        response_id: i64,
        points: i32,
    ) -> Result<ResponseRecord, AppError> {
        let mut uow = self.store.begin().await?;

        let mut response = uow
            .find_response(response_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Response not found".to_string()))?;
        let exam = uow
            .find_exam(response.exam_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Exam not found".to_string()))?;
        owned_course(uow.as_mut(), ctx, exam.course_id).await?;

        let question = uow
            .find_question(response.question_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Question not found".to_string()))?;

        if question.kind != QuestionKind::OpenText {
            return Err(AppError::validation(
                "response",
                "Only open-text responses are graded manually",
            ));
        }
        if !(0..=question.points).contains(&points) {
            return Err(AppError::validation(
                "points",
                format!("Points must be between 0 and {}", question.points),
            ));
        }

        uow.grade_response(response.id, points, points > 0).await?;

        let total_score: i32 = uow
            .list_responses(response.attempt_id)
            .await?
            .iter()
            .map(|r| {
                if r.id == response.id {
                    points
                } else {
                    r.points_awarded.unwrap_or(0)
                }
            })
            .sum();
        let passed = total_score >= exam.passing_score;
        uow.update_attempt_score(response.attempt_id, total_score, passed)
            .await?;

        uow.commit().await?;

        response.points_awarded = Some(points);
        response.is_correct = Some(points > 0);

        tracing::info!(
            response_id,
            attempt_id = response.attempt_id,
            points,
            total_score,
            "Manual grade recorded"
        );

        self.notify_student(
            response.student_id,
            Template::GradeRecorded,
            json!({
                "exam": exam.title,
                "question": question.prompt,
                "points": points,
                "total_score": total_score,
                "passed": passed,
            }),
        )
        .await;

        Ok(response)
    }

    async fn notify_student(&self, student_id: i64, template: Template, data: serde_json::Value) {
        match self.directory.find_by_id(student_id).await {
            Ok(Some(student)) => {
                send_best_effort(self.notifier.as_ref(), &student.email, template, data).await
            }
            Ok(None) => tracing::warn!(student_id, "No directory entry to notify"),
            Err(e) => tracing::warn!(student_id, "Directory lookup failed: {}", e),
        }
    }
}
