// src/models/course.rs

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Represents the 'courses' table. The core only reads the ownership link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: i64,

    /// The teacher who owns the course and everything under it.
    pub teacher_id: i64,

    pub title: String,
}

/// DTO for enrolling a student into a course.
#[derive(Debug, Deserialize, Validate)]
pub struct EnrollRequest {
    #[validate(email)]
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Enrollment {
    pub course_id: i64,
    pub student_id: i64,
    /// False when the student was already enrolled.
    pub created: bool,
}
