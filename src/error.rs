use axum::Json;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::split::SplitError;
use crate::validation::FieldError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("validation failed")]
    Validation(Vec<FieldError>),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Internal(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Password(#[from] bcrypt::BcryptError),

    #[error(transparent)]
    Token(#[from] jsonwebtoken::errors::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl From<SplitError> for AppError {
    fn from(e: SplitError) -> Self {
        AppError::BadRequest(e.to_string())
    }
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        AppError::BadRequest(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        AppError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        AppError::NotFound(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        AppError::Internal(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Database(e) if database_rejection(e).is_some() => StatusCode::BAD_REQUEST,
            AppError::Token(_) => StatusCode::UNAUTHORIZED,
            AppError::Internal(_) | AppError::Database(_) | AppError::Password(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Duplicate-key and constraint failures are caller mistakes, not outages.
fn database_rejection(error: &sqlx::Error) -> Option<&'static str> {
    let db_error = error.as_database_error()?;
    match db_error.code().as_deref() {
        Some("23505") => Some("A record with the same unique value already exists"),
        Some("23514") | Some("23502") => Some("The record violates a data constraint"),
        _ => None,
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<Vec<FieldError>>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = match status {
            StatusCode::BAD_REQUEST => "Bad Request",
            StatusCode::UNAUTHORIZED => "Unauthorized",
            StatusCode::FORBIDDEN => "Forbidden",
            StatusCode::NOT_FOUND => "Not Found",
            _ => "Server Error",
        };

        let (message, errors) = match self {
            AppError::Validation(errors) => ("Validation failed".to_string(), Some(errors)),
            AppError::Database(ref e) => match database_rejection(e) {
                Some(message) => (message.to_string(), None),
                None => {
                    tracing::error!(error = %e, "database failure");
                    ("Internal server error".to_string(), None)
                }
            },
            AppError::Password(ref e) => {
                tracing::error!(error = %e, "password hashing failure");
                ("Internal server error".to_string(), None)
            }
            AppError::Token(_) => ("Invalid or expired token".to_string(), None),
            other => (other.to_string(), None),
        };

        let body = Json(ErrorResponse {
            success: false,
            error,
            message,
            errors,
        });

        (status, body).into_response()
    }
}
