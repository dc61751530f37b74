// src/handlers/auth.rs

use axum::{
    Json,
    extract::{Extension, State},
    response::IntoResponse,
};
use serde_json::json;

use crate::{config::Config, error::AppError, models::user::AuthContext, utils::jwt::sign_jwt};

/// Issues a fresh token for the caller.
///
/// The middleware has already confirmed the role against the user directory,
/// so a demoted user cannot renew the old role.
pub async fn refresh_token(
    State(config): State<Config>,
    Extension(ctx): Extension<AuthContext>,
) -> Result<impl IntoResponse, AppError> {
    let token = sign_jwt(&ctx, &config.jwt_secret, config.jwt_expiration)?;

    tracing::debug!(user_id = ctx.user_id, "Token refreshed");

    Ok(Json(json!({
        "token": token,
        "type": "Bearer",
        "expires_in": config.jwt_expiration,
    })))
}
