// src/enrollment.rs

use std::sync::Arc;

use crate::{
    access::owned_course,
    error::AppError,
    models::{
        course::Enrollment,
        user::{AuthContext, Role},
    },
    services::directory::UserDirectory,
    store::Store,
};

/// Manages who may read a course.
#[derive(Clone)]
pub struct Roster {
    store: Arc<dyn Store>,
    directory: Arc<dyn UserDirectory>,
}

impl Roster {
    pub fn new(store: Arc<dyn Store>, directory: Arc<dyn UserDirectory>) -> Self {
        Self { store, directory }
    }

    /// Enrolls the student registered under `email`. Enrolling twice is a no-op.
    pub async fn enroll_by_email(
        &self,
        ctx: &AuthContext,
        course_id: i64,
        email: &str,
    ) -> Result<Enrollment, AppError> {
        let mut uow = self.store.begin().await?;
        owned_course(uow.as_mut(), ctx, course_id).await?;

        let student = self
            .directory
            .find_by_email(email.trim())
            .await?
            .ok_or_else(|| AppError::NotFound("No user with this email".to_string()))?;
        if student.role != Role::Student {
            return Err(AppError::validation("email", "Only students can be enrolled"));
        }

        let created = uow.enroll(course_id, student.id).await?;
        uow.commit().await?;

        if created {
            tracing::info!(course_id, student_id = student.id, "Student enrolled");
        }
        Ok(Enrollment {
            course_id,
            student_id: student.id,
            created,
        })
    }
}
