// src/handlers/courses.rs

use axum::{
    Json,
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError,
    models::{course::EnrollRequest, user::AuthContext},
    state::AppState,
};

/// Enrolls a registered student into the course.
/// Course owner only. Returns 201 for a new enrollment and 200 when it already existed.
pub async fn enroll_student(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(course_id): Path<i64>,
    Json(payload): Json<EnrollRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let enrollment = state
        .roster()
        .enroll_by_email(&ctx, course_id, &payload.email)
        .await?;
    let status = if enrollment.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(enrollment)))
}
