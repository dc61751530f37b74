// src/handlers/files.rs

use axum::{
    Json,
    body::Bytes,
    extract::{Extension, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde_json::json;

use crate::{
    error::AppError,
    models::user::{AuthContext, Role},
    state::AppState,
};

/// Upper bound for a single upload.
pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Stores the raw request body as a blob.
///
/// The uploaded file name travels in the `x-filename` header; only its
/// extension is kept. Returns the `file_ref` to attach to a content item.
pub async fn upload_file(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    if ctx.role == Role::Student {
        return Err(AppError::Forbidden(
            "Only teachers can upload files".to_string(),
        ));
    }
    if body.is_empty() {
        return Err(AppError::validation("file", "Upload is empty"));
    }

    let file_name = headers
        .get("x-filename")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("upload");

    let file_ref = state.blobs.store(file_name, &body).await?;
    let url = state.blobs.url_for(&file_ref);

    Ok((
        StatusCode::CREATED,
        Json(json!({ "file_ref": file_ref, "url": url })),
    ))
}
