// src/handlers/content.rs

use axum::{
    Json,
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        content::{CreateItemRequest, UpdateItemRequest},
        topic::{CreateTopicRequest, ReorderRequest},
        user::AuthContext,
    },
    state::AppState,
};

/// Creates a topic at the end of the course.
/// Course owner only.
pub async fn create_topic(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(course_id): Path<i64>,
    Json(payload): Json<CreateTopicRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let topic = state.content().create_topic(&ctx, course_id, &payload).await?;
    Ok((StatusCode::CREATED, Json(topic)))
}

/// Lists the topics of a course with their items, in display order.
pub async fn list_topics(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(course_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let outline = state.content().course_outline(&ctx, course_id).await?;
    Ok(Json(outline))
}

pub async fn reorder_topic(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(topic_id): Path<i64>,
    Json(payload): Json<ReorderRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let topic = state
        .content()
        .reorder_topic(&ctx, topic_id, payload.new_index)
        .await?;
    Ok(Json(topic))
}

/// Deletes a topic and every item in it.
pub async fn delete_topic(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(topic_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    state.content().delete_topic(&ctx, topic_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Appends a content item to a topic.
pub async fn create_item(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(topic_id): Path<i64>,
    Json(payload): Json<CreateItemRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let item = state.content().create_item(&ctx, topic_id, &payload).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn update_item(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(item_id): Path<i64>,
    Json(payload): Json<UpdateItemRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let item = state.content().update_item(&ctx, item_id, &payload).await?;
    Ok(Json(item))
}

/// Repositions an item. A `topic_id` different from the current one moves it there.
pub async fn reorder_item(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(item_id): Path<i64>,
    Json(payload): Json<ReorderRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let item = state
        .content()
        .move_item(&ctx, item_id, payload.topic_id, payload.new_index)
        .await?;
    Ok(Json(item))
}

pub async fn delete_item(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(item_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    state.content().delete_item(&ctx, item_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Returns the display fragment of an item, both structured and as HTML.
pub async fn render_item(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(item_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let rendered = state.content().render_item(&ctx, item_id).await?;
    Ok(Json(rendered))
}
