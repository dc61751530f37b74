// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// Global Application Error Enum.
/// Every core operation returns one of these; the HTTP layer maps them to status codes.
#[derive(Debug, PartialEq)]
pub enum AppError {
    // 400 Bad Request, with the offending field
    Validation { field: String, message: String },

    // 401 Unauthorized
    AuthError(String),

    // 403 Forbidden (ownership or role check failed)
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 403, exam outside its window or attempt quota exhausted
    AttemptNotAllowed(String),

    // 409, submission arrived at or after the exam's end
    AttemptWindowClosed,

    // 409, the same attempt was submitted twice
    DuplicateSubmission,

    // 409 Conflict (unique constraint other than a double submit)
    Conflict(String),

    // 500, persistence failed; the transaction was rolled back
    Storage(String),

    // 500, any other server-side failure (token signing, clock)
    InternalServerError(String),
}

impl AppError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::AuthError(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) | AppError::AttemptNotAllowed(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::AttemptWindowClosed
            | AppError::DuplicateSubmission
            | AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Storage(_) | AppError::InternalServerError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for AppError {}

/// Converts the error into a JSON response with the matching HTTP status code.
/// Storage details are logged and never sent to the client.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match self {
            AppError::Storage(msg) => {
                tracing::error!("Storage failure: {}", msg);
                json!({ "error": "Internal Server Error" })
            }
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal error: {}", msg);
                json!({ "error": "Internal Server Error" })
            }
            AppError::Validation { field, message } => json!({
                "error": message,
                "field": field,
            }),
            AppError::AuthError(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::AttemptNotAllowed(msg)
            | AppError::Conflict(msg) => json!({ "error": msg }),
            AppError::AttemptWindowClosed => {
                json!({ "error": "The exam window has closed" })
            }
            AppError::DuplicateSubmission => {
                json!({ "error": "This attempt has already been submitted" })
            }
        };

        (status, Json(body)).into_response()
    }
}

/// Unique violations become `Conflict`, everything else is a storage failure.
/// Allows using `?` operator on database queries.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.code().as_deref() == Some("23505") {
                return AppError::Conflict(db_err.message().to_string());
            }
        }
        AppError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::validation("payload", err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<String> = errors
            .field_errors()
            .keys()
            .map(|field| field.to_string())
            .collect();
        fields.sort();

        AppError::Validation {
            field: fields.join(","),
            message: errors.to_string(),
        }
    }
}
