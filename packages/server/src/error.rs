use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use mq::QueueError;
use sea_orm::DbErr;
use serde::Serialize;

/// Structured error response returned by all endpoints on failure.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Machine-readable error code. One of: `VALIDATION_ERROR`, `TOKEN_MISSING`,
    /// `TOKEN_INVALID`, `PERMISSION_DENIED`, `NOT_FOUND`, `ATTEMPTS_EXHAUSTED`,
    /// `NO_TEST_CASES`, `INVALID_SCORE`, `MISSING_AUTO_SCORE`,
    /// `SERVICE_UNAVAILABLE`, `INTERNAL_ERROR`.
    #[schema(example = "VALIDATION_ERROR")]
    pub code: &'static str,
    /// Human-readable error description.
    #[schema(example = "Code exceeds the maximum length of 10000 characters")]
    pub message: String,
}

/// Application-level error type.
#[derive(Debug)]
pub enum AppError {
    Validation(String),
    TokenMissing,
    TokenInvalid,
    PermissionDenied,
    NotFound(String),
    /// No submission attempts left for this assignment.
    AttemptsExhausted {
        max_submissions: i32,
    },
    NoTestCases,
    InvalidScore(String),
    MissingAutoScore,
    /// Queue store down; the client should retry later.
    ServiceUnavailable(String),
    Internal(String),
}

impl AppError {
    fn status_and_body(self) -> (StatusCode, ErrorBody) {
        match self {
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    code: "VALIDATION_ERROR",
                    message: msg,
                },
            ),
            AppError::TokenMissing => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    code: "TOKEN_MISSING",
                    message: "Authentication required".into(),
                },
            ),
            AppError::TokenInvalid => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    code: "TOKEN_INVALID",
                    message: "Invalid or expired token".into(),
                },
            ),
            AppError::PermissionDenied => (
                StatusCode::FORBIDDEN,
                ErrorBody {
                    code: "PERMISSION_DENIED",
                    message: "Insufficient permissions".into(),
                },
            ),
            AppError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    code: "NOT_FOUND",
                    message: msg,
                },
            ),
            AppError::AttemptsExhausted { max_submissions } => (
                StatusCode::FORBIDDEN,
                ErrorBody {
                    code: "ATTEMPTS_EXHAUSTED",
                    message: format!(
                        "Maximum submission attempts ({max_submissions}) reached"
                    ),
                },
            ),
            AppError::NoTestCases => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    code: "NO_TEST_CASES",
                    message: "Assignment has no test cases".into(),
                },
            ),
            AppError::InvalidScore(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    code: "INVALID_SCORE",
                    message: msg,
                },
            ),
            AppError::MissingAutoScore => (
                StatusCode::CONFLICT,
                ErrorBody {
                    code: "MISSING_AUTO_SCORE",
                    message: "Submission has no automatic score yet".into(),
                },
            ),
            AppError::ServiceUnavailable(detail) => {
                tracing::warn!("Service unavailable: {}", detail);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ErrorBody {
                        code: "SERVICE_UNAVAILABLE",
                        message: "Judge queue is unavailable, try again later".into(),
                    },
                )
            }
            AppError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        code: "INTERNAL_ERROR",
                        message: "An unexpected error occurred".into(),
                    },
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        (status, Json(body)).into_response()
    }
}

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<QueueError> for AppError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::Unavailable(detail) => AppError::ServiceUnavailable(detail),
            QueueError::Redis(e) => AppError::ServiceUnavailable(e.to_string()),
            QueueError::Serialization(e) => AppError::Internal(e.to_string()),
        }
    }
}
