// src/access.rs

//! Ownership checks shared by the content and exam services.

use crate::{
    error::AppError,
    models::{
        course::Course,
        user::{AuthContext, Role},
    },
    store::UnitOfWork,
};

/// Loads the course and requires the caller to own it. Administrators always pass.
pub async fn owned_course(
    uow: &mut dyn UnitOfWork,
    ctx: &AuthContext,
    course_id: i64,
) -> Result<Course, AppError> {
    let course = uow
        .find_course(course_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Course not found".to_string()))?;

    if ctx.is_admin() || (ctx.role == Role::Teacher && course.teacher_id == ctx.user_id) {
        Ok(course)
    } else {
        tracing::warn!(user_id = ctx.user_id, course_id, "Rejected mutation on foreign course");
        Err(AppError::Forbidden(
            "You do not own this course".to_string(),
        ))
    }
}

/// Loads the course for reading: owner, administrators and enrolled students.
pub async fn readable_course(
    uow: &mut dyn UnitOfWork,
    ctx: &AuthContext,
    course_id: i64,
) -> Result<Course, AppError> {
    let course = uow
        .find_course(course_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Course not found".to_string()))?;

    let allowed = match ctx.role {
        Role::Admin => true,
        Role::Teacher => course.teacher_id == ctx.user_id,
        Role::Student => uow.is_enrolled(course_id, ctx.user_id).await?,
    };

    if allowed {
        Ok(course)
    } else {
        Err(AppError::Forbidden(
            "You do not have access to this course".to_string(),
        ))
    }
}
