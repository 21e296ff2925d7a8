//! Request error classification.
//!
//! Handler failures fall into three categories. Framework errors keep their
//! own status and message; database and internal errors are masked behind a
//! fixed message and their cause goes to the log only.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::BoxError;

pub const DATABASE_ERROR_MESSAGE: &str = "error establishing a database connection";
pub const INTERNAL_ERROR_MESSAGE: &str = "there is an error, please contact us if you seen this message";

#[derive(Debug, Error)]
pub enum ApiError {
    /// Raised by the framework or a handler with a client-facing message.
    #[error("{status}: {message}")]
    Http { status: StatusCode, message: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(BoxError),
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "Not Found")
    }

    pub fn internal(error: impl Into<BoxError>) -> Self {
        Self::Internal(error.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Http { status, .. } => *status,
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::Http { message, .. } => message,
            ApiError::Database(e) => {
                tracing::error!(error = %e, "Database error while handling request");
                DATABASE_ERROR_MESSAGE.to_string()
            }
            ApiError::Internal(e) => {
                tracing::error!(error = %e, "Internal error while handling request");
                INTERNAL_ERROR_MESSAGE.to_string()
            }
        };
        (status, message).into_response()
    }
}
