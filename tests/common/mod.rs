// tests/common/mod.rs

//! In-memory collaborators for exercising the services without Postgres.
//!
//! A unit of work edits a private copy of the data and publishes it on
//! commit, so dropping it without committing leaves nothing behind.

#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

use courseware::{
    config::Config,
    content::ContentTree,
    enrollment::Roster,
    error::AppError,
    grading::ExamEngine,
    models::{
        attempt::{AttemptSession, AttemptStatus, NewResponse, ResponseRecord},
        content::{ContentItem, NewContentItem},
        course::Course,
        exam::Exam,
        question::{Question, QuestionKind},
        topic::Topic,
        user::{AuthContext, Role, User},
    },
    services::{
        blob::BlobStorage,
        directory::UserDirectory,
        notify::{Notifier, NotifyError, Template},
    },
    state::AppState,
    store::{OrderRange, Scope, Store, UnitOfWork},
};

pub const JWT_SECRET: &str = "test_secret_for_integration_tests";

#[derive(Debug, Clone, Default)]
pub struct Db {
    next_id: i64,
    pub users: Vec<User>,
    pub courses: Vec<Course>,
    pub enrollments: BTreeSet<(i64, i64)>,
    pub topics: Vec<Topic>,
    pub items: Vec<ContentItem>,
    pub exams: Vec<Exam>,
    pub questions: Vec<Question>,
    pub attempts: Vec<AttemptSession>,
    pub responses: Vec<ResponseRecord>,
}

impl Db {
    pub fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    /// Mirrors the deferred (parent, sort_order) unique constraints.
    fn check_orders(&self) -> Result<(), AppError> {
        let mut seen = HashSet::new();
        for topic in &self.topics {
            if topic.sort_order < 1 || !seen.insert((topic.course_id, topic.sort_order)) {
                return Err(AppError::Conflict(format!(
                    "topic order {} clashes in course {}",
                    topic.sort_order, topic.course_id
                )));
            }
        }
        let mut seen = HashSet::new();
        for item in &self.items {
            if item.sort_order < 1 || !seen.insert((item.topic_id, item.sort_order)) {
                return Err(AppError::Conflict(format!(
                    "item order {} clashes in topic {}",
                    item.sort_order, item.topic_id
                )));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    db: Arc<Mutex<Db>>,
    /// 1-based index of the `insert_response` call that fails in the next unit of work.
    fail_response_insert: Arc<Mutex<Option<usize>>>,
}

impl MemoryStore {
    pub fn snapshot(&self) -> Db {
        self.db.lock().unwrap().clone()
    }

    pub fn edit<R>(&self, f: impl FnOnce(&mut Db) -> R) -> R {
        f(&mut self.db.lock().unwrap())
    }

    pub fn fail_nth_response_insert(&self, n: usize) {
        *self.fail_response_insert.lock().unwrap() = Some(n);
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, AppError> {
        Ok(Box::new(MemoryUow {
            shared: self.db.clone(),
            db: self.db.lock().unwrap().clone(),
            fail_at: self.fail_response_insert.lock().unwrap().take(),
            inserted: 0,
        }))
    }
}

pub struct MemoryUow {
    shared: Arc<Mutex<Db>>,
    db: Db,
    fail_at: Option<usize>,
    inserted: usize,
}

fn in_scope(scope: Scope, parent: i64) -> bool {
    match scope {
        Scope::Course(id) | Scope::Topic(id) => id == parent,
    }
}

#[async_trait]
impl UnitOfWork for MemoryUow {
    async fn find_course(&mut self, course_id: i64) -> Result<Option<Course>, AppError> {
        Ok(self.db.courses.iter().find(|c| c.id == course_id).cloned())
    }

    async fn is_enrolled(&mut self, course_id: i64, student_id: i64) -> Result<bool, AppError> {
        Ok(self.db.enrollments.contains(&(course_id, student_id)))
    }

    async fn enroll(&mut self, course_id: i64, student_id: i64) -> Result<bool, AppError> {
        Ok(self.db.enrollments.insert((course_id, student_id)))
    }

    async fn max_order(&mut self, scope: Scope) -> Result<i32, AppError> {
        let max = match scope {
            Scope::Course(course_id) => self
                .db
                .topics
                .iter()
                .filter(|t| t.course_id == course_id)
                .map(|t| t.sort_order)
                .max(),
            Scope::Topic(topic_id) => self
                .db
                .items
                .iter()
                .filter(|i| i.topic_id == topic_id)
                .map(|i| i.sort_order)
                .max(),
        };
        Ok(max.unwrap_or(0))
    }

    async fn shift_orders(
        &mut self,
        scope: Scope,
        range: OrderRange,
        delta: i32,
    ) -> Result<u64, AppError> {
        let mut shifted = 0;
        match scope {
            Scope::Course(_) => {
                for topic in &mut self.db.topics {
                    if in_scope(scope, topic.course_id) && range.contains(topic.sort_order) {
                        topic.sort_order += delta;
                        shifted += 1;
                    }
                }
            }
            Scope::Topic(_) => {
                for item in &mut self.db.items {
                    if in_scope(scope, item.topic_id) && range.contains(item.sort_order) {
                        item.sort_order += delta;
                        shifted += 1;
                    }
                }
            }
        }
        Ok(shifted)
    }

    async fn find_topic(&mut self, topic_id: i64) -> Result<Option<Topic>, AppError> {
        Ok(self.db.topics.iter().find(|t| t.id == topic_id).cloned())
    }

    async fn list_topics(&mut self, course_id: i64) -> Result<Vec<Topic>, AppError> {
        let mut topics: Vec<Topic> = self
            .db
            .topics
            .iter()
            .filter(|t| t.course_id == course_id)
            .cloned()
            .collect();
        topics.sort_by_key(|t| t.sort_order);
        Ok(topics)
    }

    async fn insert_topic(
        &mut self,
        course_id: i64,
        title: &str,
        description: Option<&str>,
        sort_order: i32,
    ) -> Result<Topic, AppError> {
        let topic = Topic {
            id: self.db.next_id(),
            course_id,
            title: title.to_string(),
            description: description.map(str::to_string),
            sort_order,
        };
        self.db.topics.push(topic.clone());
        Ok(topic)
    }

    async fn set_topic_order(&mut self, topic_id: i64, sort_order: i32) -> Result<(), AppError> {
        if let Some(topic) = self.db.topics.iter_mut().find(|t| t.id == topic_id) {
            topic.sort_order = sort_order;
        }
        Ok(())
    }

    async fn delete_topic(&mut self, topic_id: i64) -> Result<(), AppError> {
        self.db.items.retain(|i| i.topic_id != topic_id);
        self.db.topics.retain(|t| t.id != topic_id);
        Ok(())
    }

    async fn find_item(&mut self, item_id: i64) -> Result<Option<ContentItem>, AppError> {
        Ok(self.db.items.iter().find(|i| i.id == item_id).cloned())
    }

    async fn list_items(&mut self, topic_id: i64) -> Result<Vec<ContentItem>, AppError> {
        let mut items: Vec<ContentItem> = self
            .db
            .items
            .iter()
            .filter(|i| i.topic_id == topic_id)
            .cloned()
            .collect();
        items.sort_by_key(|i| i.sort_order);
        Ok(items)
    }

    async fn insert_item(
        &mut self,
        item: &NewContentItem,
        sort_order: i32,
    ) -> Result<ContentItem, AppError> {
        let item = ContentItem {
            id: self.db.next_id(),
            topic_id: item.topic_id,
            title: item.title.clone(),
            kind_tag: item.kind.as_str().to_string(),
            payload: item.payload.clone(),
            file_ref: item.file_ref.clone(),
            url: item.url.clone(),
            sort_order,
        };
        self.db.items.push(item.clone());
        Ok(item)
    }

    async fn update_item(&mut self, item: &ContentItem) -> Result<(), AppError> {
        if let Some(stored) = self.db.items.iter_mut().find(|i| i.id == item.id) {
            stored.title = item.title.clone();
            stored.payload = item.payload.clone();
            stored.file_ref = item.file_ref.clone();
            stored.url = item.url.clone();
        }
        Ok(())
    }

    async fn place_item(
        &mut self,
        item_id: i64,
        topic_id: i64,
        sort_order: i32,
    ) -> Result<(), AppError> {
        if let Some(item) = self.db.items.iter_mut().find(|i| i.id == item_id) {
            item.topic_id = topic_id;
            item.sort_order = sort_order;
        }
        Ok(())
    }

    async fn delete_item(&mut self, item_id: i64) -> Result<(), AppError> {
        self.db.items.retain(|i| i.id != item_id);
        Ok(())
    }

    async fn find_exam(&mut self, exam_id: i64) -> Result<Option<Exam>, AppError> {
        Ok(self.db.exams.iter().find(|e| e.id == exam_id).cloned())
    }

    async fn find_question(&mut self, question_id: i64) -> Result<Option<Question>, AppError> {
        Ok(self.db.questions.iter().find(|q| q.id == question_id).cloned())
    }

    async fn list_questions(&mut self, exam_id: i64) -> Result<Vec<Question>, AppError> {
        Ok(self
            .db
            .questions
            .iter()
            .filter(|q| q.exam_id == exam_id)
            .cloned()
            .collect())
    }

    async fn lock_student_attempts(&mut self, _student_id: i64) -> Result<(), AppError> {
        Ok(())
    }

    async fn count_submitted_attempts(
        &mut self,
        exam_id: i64,
        student_id: i64,
    ) -> Result<i64, AppError> {
        Ok(self
            .db
            .attempts
            .iter()
            .filter(|a| {
                a.exam_id == exam_id
                    && a.student_id == student_id
                    && a.status == AttemptStatus::Submitted
            })
            .count() as i64)
    }

    async fn last_attempt_number(
        &mut self,
        exam_id: i64,
        student_id: i64,
    ) -> Result<i32, AppError> {
        Ok(self
            .db
            .attempts
            .iter()
            .filter(|a| a.exam_id == exam_id && a.student_id == student_id)
            .map(|a| a.attempt_number)
            .max()
            .unwrap_or(0))
    }

    async fn abandon_open_attempts(
        &mut self,
        exam_id: i64,
        student_id: i64,
    ) -> Result<u64, AppError> {
        let mut abandoned = 0;
        for attempt in &mut self.db.attempts {
            if attempt.exam_id == exam_id
                && attempt.student_id == student_id
                && attempt.status == AttemptStatus::InProgress
            {
                attempt.status = AttemptStatus::Abandoned;
                abandoned += 1;
            }
        }
        Ok(abandoned)
    }

    async fn insert_attempt(
        &mut self,
        exam_id: i64,
        student_id: i64,
        attempt_number: i32,
        started_at: DateTime<Utc>,
    ) -> Result<AttemptSession, AppError> {
        let attempt = AttemptSession {
            id: self.db.next_id(),
            exam_id,
            student_id,
            attempt_number,
            status: AttemptStatus::InProgress,
            started_at,
            submitted_at: None,
            total_score: None,
            passed: None,
        };
        self.db.attempts.push(attempt.clone());
        Ok(attempt)
    }

    async fn find_attempt(&mut self, attempt_id: i64) -> Result<Option<AttemptSession>, AppError> {
        Ok(self.db.attempts.iter().find(|a| a.id == attempt_id).cloned())
    }

    async fn complete_attempt(
        &mut self,
        attempt_id: i64,
        total_score: i32,
        passed: bool,
        submitted_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let Some(attempt) = self
            .db
            .attempts
            .iter_mut()
            .find(|a| a.id == attempt_id && a.status == AttemptStatus::InProgress)
        else {
            return Ok(false);
        };
        attempt.status = AttemptStatus::Submitted;
        attempt.total_score = Some(total_score);
        attempt.passed = Some(passed);
        attempt.submitted_at = Some(submitted_at);
        Ok(true)
    }

    async fn update_attempt_score(
        &mut self,
        attempt_id: i64,
        total_score: i32,
        passed: bool,
    ) -> Result<(), AppError> {
        if let Some(attempt) = self.db.attempts.iter_mut().find(|a| a.id == attempt_id) {
            attempt.total_score = Some(total_score);
            attempt.passed = Some(passed);
        }
        Ok(())
    }

    async fn insert_response(
        &mut self,
        response: &NewResponse,
    ) -> Result<ResponseRecord, AppError> {
        self.inserted += 1;
        if self.fail_at == Some(self.inserted) {
            return Err(AppError::Storage("injected write failure".to_string()));
        }

        let duplicate = self.db.responses.iter().any(|r| {
            r.question_id == response.question_id
                && r.student_id == response.student_id
                && r.exam_id == response.exam_id
                && r.attempt_number == response.attempt_number
        });
        if duplicate {
            return Err(AppError::DuplicateSubmission);
        }

        let record = ResponseRecord {
            id: self.db.next_id(),
            attempt_id: response.attempt_id,
            question_id: response.question_id,
            student_id: response.student_id,
            exam_id: response.exam_id,
            attempt_number: response.attempt_number,
            response: response.response.clone(),
            is_correct: response.is_correct,
            points_awarded: response.points_awarded,
        };
        self.db.responses.push(record.clone());
        Ok(record)
    }

    async fn find_response(
        &mut self,
        response_id: i64,
    ) -> Result<Option<ResponseRecord>, AppError> {
        Ok(self.db.responses.iter().find(|r| r.id == response_id).cloned())
    }

    async fn list_responses(&mut self, attempt_id: i64) -> Result<Vec<ResponseRecord>, AppError> {
        Ok(self
            .db
            .responses
            .iter()
            .filter(|r| r.attempt_id == attempt_id)
            .cloned()
            .collect())
    }

    async fn grade_response(
        &mut self,
        response_id: i64,
        points_awarded: i32,
        is_correct: bool,
    ) -> Result<(), AppError> {
        if let Some(response) = self.db.responses.iter_mut().find(|r| r.id == response_id) {
            response.points_awarded = Some(points_awarded);
            response.is_correct = Some(is_correct);
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        let MemoryUow { shared, db, .. } = *self;
        db.check_orders()?;
        *shared.lock().unwrap() = db;
        Ok(())
    }
}

/// Reads users from the same in-memory data as the store.
#[derive(Clone)]
pub struct MemoryDirectory {
    db: Arc<Mutex<Db>>,
}

#[async_trait]
impl UserDirectory for MemoryDirectory {
    async fn find_by_id(&self, user_id: i64) -> Result<Option<User>, AppError> {
        Ok(self
            .db
            .lock()
            .unwrap()
            .users
            .iter()
            .find(|u| u.id == user_id)
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .db
            .lock()
            .unwrap()
            .users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }
}

#[derive(Default)]
pub struct MemoryBlobs {
    pub files: Mutex<HashMap<String, Vec<u8>>>,
    counter: Mutex<u32>,
}

impl MemoryBlobs {
    pub fn contains(&self, file_ref: &str) -> bool {
        self.files.lock().unwrap().contains_key(file_ref)
    }
}

#[async_trait]
impl BlobStorage for MemoryBlobs {
    async fn store(&self, file_name: &str, bytes: &[u8]) -> Result<String, AppError> {
        let mut counter = self.counter.lock().unwrap();
        *counter += 1;
        let ext = file_name.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("bin");
        let file_ref = format!("blob-{}.{}", *counter, ext);
        self.files
            .lock()
            .unwrap()
            .insert(file_ref.clone(), bytes.to_vec());
        Ok(file_ref)
    }

    async fn delete(&self, file_ref: &str) -> Result<bool, AppError> {
        Ok(self.files.lock().unwrap().remove(file_ref).is_some())
    }

    fn url_for(&self, file_ref: &str) -> String {
        format!("/files/{file_ref}")
    }
}

/// Records every notification; optionally fails each send after recording it.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(String, Template, Value)>>,
    pub fail: bool,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<(String, Template, Value)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, to_email: &str, template: Template, data: Value) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap()
            .push((to_email.to_string(), template, data));
        if self.fail {
            Err(NotifyError("relay unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

/// A course owned by `teacher` with one enrolled student.
pub struct Fixture {
    pub store: MemoryStore,
    pub blobs: Arc<MemoryBlobs>,
    pub notifier: Arc<RecordingNotifier>,
    pub admin: AuthContext,
    pub teacher: AuthContext,
    pub other_teacher: AuthContext,
    pub student: AuthContext,
    /// Registered but not enrolled.
    pub outsider: AuthContext,
    pub course_id: i64,
}

impl Fixture {
    pub fn new() -> Self {
        Self::build(false)
    }

    pub fn with_failing_notifier() -> Self {
        Self::build(true)
    }

    fn build(failing_notifier: bool) -> Self {
        let store = MemoryStore::default();
        let course_id = store.edit(|db| {
            let users = [
                (Role::Admin, "admin@school.test", "Ada Admin"),
                (Role::Teacher, "teacher@school.test", "Tess Teacher"),
                (Role::Teacher, "other@school.test", "Otto Other"),
                (Role::Student, "student@school.test", "Sam Student"),
                (Role::Student, "outsider@school.test", "Olive Outsider"),
            ];
            for (role, email, name) in users {
                let id = db.next_id();
                db.users.push(User {
                    id,
                    email: email.to_string(),
                    name: name.to_string(),
                    role,
                });
            }
            let course_id = db.next_id();
            db.courses.push(Course {
                id: course_id,
                teacher_id: 2,
                title: "Intro to Rust".to_string(),
            });
            db.enrollments.insert((course_id, 4));
            course_id
        });

        Self {
            store,
            blobs: Arc::new(MemoryBlobs::default()),
            notifier: Arc::new(RecordingNotifier {
                fail: failing_notifier,
                ..Default::default()
            }),
            admin: AuthContext::new(1, Role::Admin),
            teacher: AuthContext::new(2, Role::Teacher),
            other_teacher: AuthContext::new(3, Role::Teacher),
            student: AuthContext::new(4, Role::Student),
            outsider: AuthContext::new(5, Role::Student),
            course_id,
        }
    }

    pub fn directory(&self) -> Arc<MemoryDirectory> {
        Arc::new(MemoryDirectory {
            db: self.store.db.clone(),
        })
    }

    pub fn content(&self) -> ContentTree {
        ContentTree::new(Arc::new(self.store.clone()), self.blobs.clone())
    }

    pub fn exams(&self) -> ExamEngine {
        ExamEngine::new(
            Arc::new(self.store.clone()),
            self.directory(),
            self.notifier.clone(),
        )
    }

    pub fn roster(&self) -> Roster {
        Roster::new(Arc::new(self.store.clone()), self.directory())
    }

    pub fn app_state(&self) -> AppState {
        AppState {
            config: Config {
                database_url: "postgres://unused".to_string(),
                jwt_secret: JWT_SECRET.to_string(),
                jwt_expiration: 3600,
                rust_log: "error".to_string(),
                bind_addr: "127.0.0.1:0".to_string(),
                upload_dir: PathBuf::from("target/test-uploads"),
                public_files_url: "/files".to_string(),
                notify_webhook_url: None,
            },
            store: Arc::new(self.store.clone()),
            directory: self.directory(),
            blobs: self.blobs.clone(),
            notifier: self.notifier.clone(),
        }
    }

    /// Adds a user and returns its id.
    pub fn add_user(&self, role: Role, email: &str) -> i64 {
        self.store.edit(|db| {
            let id = db.next_id();
            db.users.push(User {
                id,
                email: email.to_string(),
                name: email.to_string(),
                role,
            });
            id
        })
    }

    /// Adds an exam whose window is open from an hour ago to an hour from now.
    pub fn add_open_exam(&self, max_attempts: i32, passing_score: i32) -> i64 {
        let now = Utc::now();
        self.add_exam(
            now - Duration::hours(1),
            now + Duration::hours(1),
            max_attempts,
            passing_score,
        )
    }

    pub fn add_exam(
        &self,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
        max_attempts: i32,
        passing_score: i32,
    ) -> i64 {
        let course_id = self.course_id;
        self.store.edit(|db| {
            let id = db.next_id();
            db.exams.push(Exam {
                id,
                course_id,
                title: format!("Exam {id}"),
                starts_at,
                ends_at,
                duration_minutes: 30,
                max_attempts,
                passing_score,
            });
            id
        })
    }

    pub fn add_question(
        &self,
        exam_id: i64,
        kind: QuestionKind,
        correct: &[&str],
        points: i32,
    ) -> i64 {
        self.store.edit(|db| {
            let id = db.next_id();
            db.questions.push(Question {
                id,
                exam_id,
                kind,
                prompt: format!("Question {id}"),
                points,
                options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
                correct_answer: correct.iter().map(|s| s.to_string()).collect(),
            });
            id
        })
    }

    /// Topic ids of the course in display order, with their orders.
    pub fn topic_orders(&self) -> Vec<(i64, i32)> {
        let mut topics: Vec<(i64, i32)> = self
            .store
            .snapshot()
            .topics
            .iter()
            .filter(|t| t.course_id == self.course_id)
            .map(|t| (t.id, t.sort_order))
            .collect();
        topics.sort_by_key(|(_, order)| *order);
        topics
    }

    /// Item ids of a topic in display order, with their orders.
    pub fn item_orders(&self, topic_id: i64) -> Vec<(i64, i32)> {
        let mut items: Vec<(i64, i32)> = self
            .store
            .snapshot()
            .items
            .iter()
            .filter(|i| i.topic_id == topic_id)
            .map(|i| (i.id, i.sort_order))
            .collect();
        items.sort_by_key(|(_, order)| *order);
        items
    }
}

/// Asserts that the orders are exactly 1..=n.
pub fn assert_dense(orders: &[(i64, i32)]) {
    let actual: Vec<i32> = orders.iter().map(|(_, order)| *order).collect();
    let expected: Vec<i32> = (1..=orders.len() as i32).collect();
    assert_eq!(actual, expected, "orders are not dense: {orders:?}");
}
