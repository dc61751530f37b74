// src/store/postgres.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction, types::Json};

use crate::{
    error::AppError,
    models::{
        attempt::{Answer, AttemptSession, NewResponse, ResponseRecord},
        content::{ContentItem, NewContentItem},
        course::Course,
        exam::Exam,
        question::Question,
        topic::Topic,
    },
    store::{OrderRange, Scope, Store, UnitOfWork},
};

/// Postgres-backed store. Each unit of work is one database transaction.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, AppError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }
}

pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

/// Table and parent column holding a scope's members.
fn scope_sql(scope: Scope) -> (&'static str, &'static str, i64) {
    match scope {
        Scope::Course(course_id) => ("topics", "course_id", course_id),
        Scope::Topic(topic_id) => ("content_items", "topic_id", topic_id),
    }
}

#[derive(FromRow)]
struct CourseRow {
    id: i64,
    teacher_id: i64,
    title: String,
}

#[derive(FromRow)]
struct TopicRow {
    id: i64,
    course_id: i64,
    title: String,
    description: Option<String>,
    sort_order: i32,
}

impl From<TopicRow> for Topic {
    fn from(row: TopicRow) -> Self {
        Topic {
            id: row.id,
            course_id: row.course_id,
            title: row.title,
            description: row.description,
            sort_order: row.sort_order,
        }
    }
}

#[derive(FromRow)]
struct ItemRow {
    id: i64,
    topic_id: i64,
    title: String,
    kind: String,
    payload: String,
    file_ref: Option<String>,
    url: Option<String>,
    sort_order: i32,
}

impl From<ItemRow> for ContentItem {
    fn from(row: ItemRow) -> Self {
        ContentItem {
            id: row.id,
            topic_id: row.topic_id,
            title: row.title,
            kind_tag: row.kind,
            payload: row.payload,
            file_ref: row.file_ref,
            url: row.url,
            sort_order: row.sort_order,
        }
    }
}

#[derive(FromRow)]
struct ExamRow {
    id: i64,
    course_id: i64,
    title: String,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    duration_minutes: i32,
    max_attempts: i32,
    passing_score: i32,
}

#[derive(FromRow)]
struct QuestionRow {
    id: i64,
    exam_id: i64,
    kind: String,
    prompt: String,
    points: i32,
    options: Json<Vec<String>>,
    correct_answer: Json<Vec<String>>,
}

impl TryFrom<QuestionRow> for Question {
    type Error = AppError;

    fn try_from(row: QuestionRow) -> Result<Self, Self::Error> {
        Ok(Question {
            id: row.id,
            exam_id: row.exam_id,
            kind: row.kind.parse().map_err(AppError::Storage)?,
            prompt: row.prompt,
            points: row.points,
            options: row.options.0,
            correct_answer: row.correct_answer.0,
        })
    }
}

#[derive(FromRow)]
struct AttemptRow {
    id: i64,
    exam_id: i64,
    student_id: i64,
    attempt_number: i32,
    status: String,
    started_at: DateTime<Utc>,
    submitted_at: Option<DateTime<Utc>>,
    total_score: Option<i32>,
    passed: Option<bool>,
}

impl TryFrom<AttemptRow> for AttemptSession {
    type Error = AppError;

    fn try_from(row: AttemptRow) -> Result<Self, Self::Error> {
        Ok(AttemptSession {
            id: row.id,
            exam_id: row.exam_id,
            student_id: row.student_id,
            attempt_number: row.attempt_number,
            status: row.status.parse().map_err(AppError::Storage)?,
            started_at: row.started_at,
            submitted_at: row.submitted_at,
            total_score: row.total_score,
            passed: row.passed,
        })
    }
}

#[derive(FromRow)]
struct ResponseRow {
    id: i64,
    session_id: i64,
    question_id: i64,
    student_id: i64,
    exam_id: i64,
    attempt_number: i32,
    response: Json<Answer>,
    is_correct: Option<bool>,
    points_awarded: Option<i32>,
}

impl From<ResponseRow> for ResponseRecord {
    fn from(row: ResponseRow) -> Self {
        ResponseRecord {
            id: row.id,
            attempt_id: row.session_id,
            question_id: row.question_id,
            student_id: row.student_id,
            exam_id: row.exam_id,
            attempt_number: row.attempt_number,
            response: row.response.0,
            is_correct: row.is_correct,
            points_awarded: row.points_awarded,
        }
    }
}

const ITEM_COLUMNS: &str = "id, topic_id, title, kind, payload, file_ref, url, sort_order";
const ATTEMPT_COLUMNS: &str = "id, exam_id, student_id, attempt_number, status, started_at, \
     submitted_at, total_score, passed";
const RESPONSE_COLUMNS: &str = "id, session_id, question_id, student_id, exam_id, \
     attempt_number, response, is_correct, points_awarded";

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn find_course(&mut self, course_id: i64) -> Result<Option<Course>, AppError> {
        let row = sqlx::query_as::<_, CourseRow>(
            "SELECT id, teacher_id, title FROM courses WHERE id = $1",
        )
        .bind(course_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(|r| Course {
            id: r.id,
            teacher_id: r.teacher_id,
            title: r.title,
        }))
    }

    async fn is_enrolled(&mut self, course_id: i64, student_id: i64) -> Result<bool, AppError> {
        let found: Option<i32> = sqlx::query_scalar(
            "SELECT 1 FROM enrollments WHERE course_id = $1 AND student_id = $2",
        )
        .bind(course_id)
        .bind(student_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(found.is_some())
    }

    async fn enroll(&mut self, course_id: i64, student_id: i64) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO enrollments (course_id, student_id)
            VALUES ($1, $2)
            ON CONFLICT (course_id, student_id) DO NOTHING
            "#,
        )
        .bind(course_id)
        .bind(student_id)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn max_order(&mut self, scope: Scope) -> Result<i32, AppError> {
        let (table, parent, parent_id) = scope_sql(scope);
        let sql = format!("SELECT COALESCE(MAX(sort_order), 0) FROM {table} WHERE {parent} = $1");

        let max: i32 = sqlx::query_scalar(&sql)
            .bind(parent_id)
            .fetch_one(&mut *self.tx)
            .await?;

        Ok(max)
    }

    async fn shift_orders(
        &mut self,
        scope: Scope,
        range: OrderRange,
        delta: i32,
    ) -> Result<u64, AppError> {
        let (table, parent, parent_id) = scope_sql(scope);
        // The (parent, sort_order) unique constraint is deferred, so the
        // intermediate states of this update are allowed to collide.
        let sql = format!(
            "UPDATE {table} SET sort_order = sort_order + $1 \
             WHERE {parent} = $2 AND sort_order >= $3 AND ($4::INT IS NULL OR sort_order <= $4)"
        );

        let result = sqlx::query(&sql)
            .bind(delta)
            .bind(parent_id)
            .bind(range.from)
            .bind(range.to)
            .execute(&mut *self.tx)
            .await?;

        tracing::debug!(?scope, ?range, delta, rows = result.rows_affected(), "Shifted orders");
        Ok(result.rows_affected())
    }

    async fn find_topic(&mut self, topic_id: i64) -> Result<Option<Topic>, AppError> {
        let row = sqlx::query_as::<_, TopicRow>(
            "SELECT id, course_id, title, description, sort_order FROM topics WHERE id = $1",
        )
        .bind(topic_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(Topic::from))
    }

    async fn list_topics(&mut self, course_id: i64) -> Result<Vec<Topic>, AppError> {
        let rows = sqlx::query_as::<_, TopicRow>(
            r#"
            SELECT id, course_id, title, description, sort_order
            FROM topics
            WHERE course_id = $1
            ORDER BY sort_order, id
            "#,
        )
        .bind(course_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows.into_iter().map(Topic::from).collect())
    }

    async fn insert_topic(
        &mut self,
        course_id: i64,
        title: &str,
        description: Option<&str>,
        sort_order: i32,
    ) -> Result<Topic, AppError> {
        let row = sqlx::query_as::<_, TopicRow>(
            r#"
            INSERT INTO topics (course_id, title, description, sort_order)
            VALUES ($1, $2, $3, $4)
            RETURNING id, course_id, title, description, sort_order
            "#,
        )
        .bind(course_id)
        .bind(title)
        .bind(description)
        .bind(sort_order)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(row.into())
    }

    async fn set_topic_order(&mut self, topic_id: i64, sort_order: i32) -> Result<(), AppError> {
        sqlx::query("UPDATE topics SET sort_order = $1 WHERE id = $2")
            .bind(sort_order)
            .bind(topic_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn delete_topic(&mut self, topic_id: i64) -> Result<(), AppError> {
        // content_items cascade via foreign key
        sqlx::query("DELETE FROM topics WHERE id = $1")
            .bind(topic_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn find_item(&mut self, item_id: i64) -> Result<Option<ContentItem>, AppError> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM content_items WHERE id = $1");
        let row = sqlx::query_as::<_, ItemRow>(&sql)
            .bind(item_id)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(row.map(ContentItem::from))
    }

    async fn list_items(&mut self, topic_id: i64) -> Result<Vec<ContentItem>, AppError> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM content_items WHERE topic_id = $1 ORDER BY sort_order, id"
        );
        let rows = sqlx::query_as::<_, ItemRow>(&sql)
            .bind(topic_id)
            .fetch_all(&mut *self.tx)
            .await?;

        Ok(rows.into_iter().map(ContentItem::from).collect())
    }

    async fn insert_item(
        &mut self,
        item: &NewContentItem,
        sort_order: i32,
    ) -> Result<ContentItem, AppError> {
        let sql = format!(
            "INSERT INTO content_items (topic_id, title, kind, payload, file_ref, url, sort_order) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {ITEM_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ItemRow>(&sql)
            .bind(item.topic_id)
            .bind(&item.title)
            .bind(item.kind.as_str())
            .bind(&item.payload)
            .bind(&item.file_ref)
            .bind(&item.url)
            .bind(sort_order)
            .fetch_one(&mut *self.tx)
            .await?;

        Ok(row.into())
    }

    async fn update_item(&mut self, item: &ContentItem) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE content_items
            SET title = $1, payload = $2, file_ref = $3, url = $4
            WHERE id = $5
            "#,
        )
        .bind(&item.title)
        .bind(&item.payload)
        .bind(&item.file_ref)
        .bind(&item.url)
        .bind(item.id)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn place_item(
        &mut self,
        item_id: i64,
        topic_id: i64,
        sort_order: i32,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE content_items SET topic_id = $1, sort_order = $2 WHERE id = $3")
            .bind(topic_id)
            .bind(sort_order)
            .bind(item_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn delete_item(&mut self, item_id: i64) -> Result<(), AppError> {
        sqlx::query("DELETE FROM content_items WHERE id = $1")
            .bind(item_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn find_exam(&mut self, exam_id: i64) -> Result<Option<Exam>, AppError> {
        let row = sqlx::query_as::<_, ExamRow>(
            r#"
            SELECT id, course_id, title, starts_at, ends_at,
                   duration_minutes, max_attempts, passing_score
            FROM exams
            WHERE id = $1
            "#,
        )
        .bind(exam_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(|r| Exam {
            id: r.id,
            course_id: r.course_id,
            title: r.title,
            starts_at: r.starts_at,
            ends_at: r.ends_at,
            duration_minutes: r.duration_minutes,
            max_attempts: r.max_attempts,
            passing_score: r.passing_score,
        }))
    }

    async fn find_question(&mut self, question_id: i64) -> Result<Option<Question>, AppError> {
        let row = sqlx::query_as::<_, QuestionRow>(
            r#"
            SELECT id, exam_id, kind, prompt, points, options, correct_answer
            FROM questions
            WHERE id = $1
            "#,
        )
        .bind(question_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(Question::try_from).transpose()
    }

    async fn list_questions(&mut self, exam_id: i64) -> Result<Vec<Question>, AppError> {
        let rows = sqlx::query_as::<_, QuestionRow>(
            r#"
            SELECT id, exam_id, kind, prompt, points, options, correct_answer
            FROM questions
            WHERE exam_id = $1
            ORDER BY position, id
            "#,
        )
        .bind(exam_id)
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(Question::try_from).collect()
    }

    async fn lock_student_attempts(&mut self, student_id: i64) -> Result<(), AppError> {
        // Row lock on the student; concurrent starts and submits queue behind it.
        sqlx::query("SELECT id FROM users WHERE id = $1 FOR NO KEY UPDATE")
            .bind(student_id)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn count_submitted_attempts(
        &mut self,
        exam_id: i64,
        student_id: i64,
    ) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM exam_sessions
            WHERE exam_id = $1 AND student_id = $2 AND status = 'submitted'
            "#,
        )
        .bind(exam_id)
        .bind(student_id)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(count)
    }

    async fn last_attempt_number(
        &mut self,
        exam_id: i64,
        student_id: i64,
    ) -> Result<i32, AppError> {
        let last: i32 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(MAX(attempt_number), 0) FROM exam_sessions
            WHERE exam_id = $1 AND student_id = $2
            "#,
        )
        .bind(exam_id)
        .bind(student_id)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(last)
    }

    async fn abandon_open_attempts(
        &mut self,
        exam_id: i64,
        student_id: i64,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE exam_sessions SET status = 'abandoned'
            WHERE exam_id = $1 AND student_id = $2 AND status = 'in_progress'
            "#,
        )
        .bind(exam_id)
        .bind(student_id)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected())
    }

    async fn insert_attempt(
        &mut self,
        exam_id: i64,
        student_id: i64,
        attempt_number: i32,
        started_at: DateTime<Utc>,
    ) -> Result<AttemptSession, AppError> {
        let sql = format!(
            "INSERT INTO exam_sessions (exam_id, student_id, attempt_number, status, started_at) \
             VALUES ($1, $2, $3, 'in_progress', $4) RETURNING {ATTEMPT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, AttemptRow>(&sql)
            .bind(exam_id)
            .bind(student_id)
            .bind(attempt_number)
            .bind(started_at)
            .fetch_one(&mut *self.tx)
            .await?;

        row.try_into()
    }

    async fn find_attempt(&mut self, attempt_id: i64) -> Result<Option<AttemptSession>, AppError> {
        let sql = format!("SELECT {ATTEMPT_COLUMNS} FROM exam_sessions WHERE id = $1");
        let row = sqlx::query_as::<_, AttemptRow>(&sql)
            .bind(attempt_id)
            .fetch_optional(&mut *self.tx)
            .await?;

        row.map(AttemptSession::try_from).transpose()
    }

    async fn complete_attempt(
        &mut self,
        attempt_id: i64,
        total_score: i32,
        passed: bool,
        submitted_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE exam_sessions
            SET status = 'submitted', total_score = $1, passed = $2, submitted_at = $3
            WHERE id = $4 AND status = 'in_progress'
            "#,
        )
        .bind(total_score)
        .bind(passed)
        .bind(submitted_at)
        .bind(attempt_id)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn update_attempt_score(
        &mut self,
        attempt_id: i64,
        total_score: i32,
        passed: bool,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE exam_sessions SET total_score = $1, passed = $2 WHERE id = $3")
            .bind(total_score)
            .bind(passed)
            .bind(attempt_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn insert_response(
        &mut self,
        response: &NewResponse,
    ) -> Result<ResponseRecord, AppError> {
        let sql = format!(
            "INSERT INTO exam_attempts \
             (session_id, question_id, student_id, exam_id, attempt_number, response, is_correct, points_awarded) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {RESPONSE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ResponseRow>(&sql)
            .bind(response.attempt_id)
            .bind(response.question_id)
            .bind(response.student_id)
            .bind(response.exam_id)
            .bind(response.attempt_number)
            .bind(Json(&response.response))
            .bind(response.is_correct)
            .bind(response.points_awarded)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| match AppError::from(e) {
                AppError::Conflict(_) => AppError::DuplicateSubmission,
                other => other,
            })?;

        Ok(row.into())
    }

    async fn find_response(
        &mut self,
        response_id: i64,
    ) -> Result<Option<ResponseRecord>, AppError> {
        let sql = format!("SELECT {RESPONSE_COLUMNS} FROM exam_attempts WHERE id = $1");
        let row = sqlx::query_as::<_, ResponseRow>(&sql)
            .bind(response_id)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(row.map(ResponseRecord::from))
    }

    async fn list_responses(&mut self, attempt_id: i64) -> Result<Vec<ResponseRecord>, AppError> {
        let sql = format!(
            "SELECT {RESPONSE_COLUMNS} FROM exam_attempts WHERE session_id = $1 ORDER BY id"
        );
        let rows = sqlx::query_as::<_, ResponseRow>(&sql)
            .bind(attempt_id)
            .fetch_all(&mut *self.tx)
            .await?;

        Ok(rows.into_iter().map(ResponseRecord::from).collect())
    }

    async fn grade_response(
        &mut self,
        response_id: i64,
        points_awarded: i32,
        is_correct: bool,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE exam_attempts SET points_awarded = $1, is_correct = $2 WHERE id = $3")
            .bind(points_awarded)
            .bind(is_correct)
            .bind(response_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        self.tx.commit().await?;
        Ok(())
    }
}
