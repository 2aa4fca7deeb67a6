//! Error types for the library API

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application error codes returned in every error body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Success = 0,
    Failure = 1,
    NotAuthorized = 2,
    DbFailure = 3,
    NoSuchEntity = 4,
    BookNotAvailable = 5,
    UnpaidFines = 6,
    InvalidLoanState = 7,
    Duplicate = 8,
    BadValue = 9,
    InvariantViolation = 10,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Unavailable: {0}")]
    Unavailable(String),

    #[error("Not eligible: {0}")]
    Eligibility(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}

impl AppError {
    /// Map a database error to `Conflict` when it is a unique-key violation.
    pub fn from_unique_violation(err: sqlx::Error, message: &str) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::Conflict(message.to_string())
            }
            _ => AppError::Database(err),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, ErrorCode) {
        match self {
            AppError::Authentication(_) => (StatusCode::UNAUTHORIZED, ErrorCode::NotAuthorized),
            AppError::Authorization(_) => (StatusCode::FORBIDDEN, ErrorCode::NotAuthorized),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, ErrorCode::NoSuchEntity),
            AppError::Validation(_) | AppError::BadRequest(_) => {
                (StatusCode::BAD_REQUEST, ErrorCode::BadValue)
            }
            AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::DbFailure),
            AppError::Conflict(_) => (StatusCode::CONFLICT, ErrorCode::Duplicate),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::Failure),
            AppError::Unavailable(_) => (StatusCode::BAD_REQUEST, ErrorCode::BookNotAvailable),
            AppError::Eligibility(_) => (StatusCode::BAD_REQUEST, ErrorCode::UnpaidFines),
            AppError::InvalidState(_) => (StatusCode::BAD_REQUEST, ErrorCode::InvalidLoanState),
            AppError::InvariantViolation(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::InvariantViolation)
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                "Database error".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
            AppError::InvariantViolation(msg) => {
                tracing::error!("Invariant violation: {}", msg);
                msg.clone()
            }
            AppError::Authentication(msg)
            | AppError::Authorization(msg)
            | AppError::NotFound(msg)
            | AppError::Validation(msg)
            | AppError::Conflict(msg)
            | AppError::BadRequest(msg)
            | AppError::Unavailable(msg)
            | AppError::Eligibility(msg)
            | AppError::InvalidState(msg) => msg.clone(),
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_errors_map_to_client_errors() {
        let cases = [
            AppError::Unavailable("no copies".into()),
            AppError::Eligibility("unpaid fines".into()),
            AppError::InvalidState("already returned".into()),
        ];
        for err in cases {
            assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn test_not_found_and_invariant_status() {
        assert_eq!(
            AppError::NotFound("Loan".into()).into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::InvariantViolation("quantity".into()).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_codes_are_distinct() {
        let (_, unavailable) = AppError::Unavailable(String::new()).status_and_code();
        let (_, eligibility) = AppError::Eligibility(String::new()).status_and_code();
        let (_, state) = AppError::InvalidState(String::new()).status_and_code();
        assert_ne!(unavailable, eligibility);
        assert_ne!(eligibility, state);
        assert_eq!(state as u32, 7);
    }
}
