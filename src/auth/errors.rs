use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Failures raised by a `UserStore` implementation.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("user store unavailable: {0}")]
    Unavailable(String),

    #[error("email already exists")]
    DuplicateEmail,
}

/// Every way a signup, login or profile request can fail.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),

    #[error("Email already registered")]
    DuplicateEmail,

    // Same message for unknown email and wrong password.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Access token required")]
    MissingToken,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("User not found")]
    UserNotFound,

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail => AuthError::DuplicateEmail,
            StoreError::Unavailable(detail) => AuthError::StoreUnavailable(detail),
        }
    }
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Validation(_) | AuthError::DuplicateEmail => StatusCode::BAD_REQUEST,
            AuthError::InvalidCredentials | AuthError::MissingToken | AuthError::InvalidToken => {
                StatusCode::UNAUTHORIZED
            }
            AuthError::UserNotFound => StatusCode::NOT_FOUND,
            AuthError::StoreUnavailable(_) | AuthError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to hand to a client. Server-side detail stays in the logs.
    pub fn public_message(&self) -> String {
        match self {
            AuthError::StoreUnavailable(_) | AuthError::Internal(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        let body = ErrorBody {
            success: false,
            error: self.public_message(),
        };
        (status, Json(body)).into_response()
    }
}
