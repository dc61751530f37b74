// src/handlers/exam.rs

use axum::{
    Json,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        attempt::{GradeRequest, SubmitAttemptRequest},
        user::AuthContext,
    },
    state::AppState,
};

/// Starts a new attempt and returns the questions without their answer keys.
/// Students only.
pub async fn start_attempt(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(exam_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let started = state.exams().start_attempt(&ctx, exam_id, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(started)))
}

/// Submits and auto-grades an attempt.
///
/// * Late submissions are rejected with 409.
/// * A second submission of the same attempt is rejected with 409.
pub async fn submit_attempt(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(attempt_id): Path<i64>,
    Json(payload): Json<SubmitAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    let result = state
        .exams()
        .submit_attempt(&ctx, attempt_id, &payload.answers, Utc::now())
        .await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
pub struct AttemptCountQuery {
    pub student_id: Option<i64>,
}

/// Number of submitted attempts. Students see their own count; teachers and
/// admins may ask for any student of a course they can manage.
pub async fn attempts_taken(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(exam_id): Path<i64>,
    Query(query): Query<AttemptCountQuery>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = query.student_id.unwrap_or(ctx.user_id);
    let taken = state
        .exams()
        .attempts_taken(&ctx, student_id, exam_id)
        .await?;

    Ok(Json(json!({
        "exam_id": exam_id,
        "student_id": student_id,
        "attempts_taken": taken,
    })))
}

/// Records points for an open-text response.
/// Course owner only.
pub async fn grade_response(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(response_id): Path<i64>,
    Json(payload): Json<GradeRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let response = state
        .exams()
        .grade_response(&ctx, response_id, payload.points)
        .await?;
    Ok(Json(response))
}
