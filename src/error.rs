use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;
use validator::ValidationErrors;

use crate::{dao::storage::StorageError, state::engine::GameError};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Malformed input, rejected before any transaction.
    #[error("invalid input: {0}")]
    Validation(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Requested status is not reachable from the current one.
    #[error("{0}")]
    IllegalTransition(String),
    /// Operation cannot be performed in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Player already holds a terminal status for the question.
    #[error("player {0} already answered this question")]
    AlreadyAnswered(Uuid),
    /// Question is not taking buzzes or answers.
    #[error("question is not accepting answers")]
    QuestionNotActive,
    /// Answer payload does not fit the question kind.
    #[error("invalid answer format: {0}")]
    InvalidAnswerFormat(String),
    /// Optimistic concurrency retries were exhausted.
    #[error("game {game_id} kept changing concurrently after {attempts} attempts")]
    TransactionConflict {
        /// Game whose transaction failed.
        game_id: Uuid,
        /// Number of attempts made.
        attempts: u32,
    },
    /// Caller is not allowed to perform the operation.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

impl From<GameError> for ServiceError {
    fn from(err: GameError) -> Self {
        match err {
            GameError::Validation(message) => ServiceError::Validation(message),
            GameError::NotFound(message) => ServiceError::NotFound(message),
            GameError::IllegalTransition(illegal) => {
                ServiceError::IllegalTransition(illegal.to_string())
            }
            GameError::InvalidState(message) => ServiceError::InvalidState(message),
            GameError::AlreadyAnswered(player_id) => ServiceError::AlreadyAnswered(player_id),
            GameError::QuestionNotActive => ServiceError::QuestionNotActive,
            GameError::InvalidAnswerFormat(message) => ServiceError::InvalidAnswerFormat(message),
            GameError::Unauthorized(message) => ServiceError::Unauthorized(message),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Stable machine-readable code sent with every error response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Input failed validation.
    ValidationFailed,
    /// Caller identity missing or malformed.
    Unauthorized,
    /// Caller lacks the required role.
    Forbidden,
    /// Resource does not exist.
    NotFound,
    /// Requested status is not reachable.
    IllegalTransition,
    /// Operation not allowed in the current state.
    InvalidState,
    /// Player already answered the question.
    AlreadyAnswered,
    /// Question is not taking buzzes or answers.
    QuestionNotActive,
    /// Concurrent updates kept winning; the request may be retried.
    TransactionConflict,
    /// Answer payload does not fit the question.
    InvalidAnswerFormat,
    /// Storage backend failed.
    StorageUnavailable,
    /// Server runs without storage.
    Degraded,
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Caller identity is missing or malformed.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Caller is known but not allowed to perform the operation.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {1}")]
    Conflict(ErrorCode, String),
    /// Well-formed payload that does not fit the target.
    #[error("unprocessable: {0}")]
    Unprocessable(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {1}")]
    ServiceUnavailable(ErrorCode, String),
}

impl AppError {
    /// Code identifying the error kind for clients.
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::BadRequest(_) => ErrorCode::ValidationFailed,
            AppError::Unauthorized(_) => ErrorCode::Unauthorized,
            AppError::Forbidden(_) => ErrorCode::Forbidden,
            AppError::NotFound(_) => ErrorCode::NotFound,
            AppError::Conflict(code, _) | AppError::ServiceUnavailable(code, _) => *code,
            AppError::Unprocessable(_) => ErrorCode::InvalidAnswerFormat,
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        let message = err.to_string();
        match err {
            ServiceError::Validation(_) => AppError::BadRequest(message),
            ServiceError::NotFound(_) => AppError::NotFound(message),
            ServiceError::IllegalTransition(_) => {
                AppError::Conflict(ErrorCode::IllegalTransition, message)
            }
            ServiceError::InvalidState(_) => AppError::Conflict(ErrorCode::InvalidState, message),
            ServiceError::AlreadyAnswered(_) => {
                AppError::Conflict(ErrorCode::AlreadyAnswered, message)
            }
            ServiceError::QuestionNotActive => {
                AppError::Conflict(ErrorCode::QuestionNotActive, message)
            }
            ServiceError::TransactionConflict { .. } => {
                AppError::Conflict(ErrorCode::TransactionConflict, message)
            }
            ServiceError::InvalidAnswerFormat(_) => AppError::Unprocessable(message),
            ServiceError::Unauthorized(_) => AppError::Forbidden(message),
            ServiceError::Unavailable(source) => {
                AppError::ServiceUnavailable(ErrorCode::StorageUnavailable, source.to_string())
            }
            ServiceError::Degraded => {
                AppError::ServiceUnavailable(ErrorCode::Degraded, "degraded mode".into())
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    code: ErrorCode,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(..) => StatusCode::CONFLICT,
            AppError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::ServiceUnavailable(..) => StatusCode::SERVICE_UNAVAILABLE,
        };

        let payload = Json(ErrorBody {
            code: self.code(),
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::state_machine::{GameStatus, IllegalTransition};

    fn status_of(err: ServiceError) -> StatusCode {
        AppError::from(err).into_response().status()
    }

    #[test]
    fn service_errors_map_to_http_statuses() {
        let illegal = GameError::IllegalTransition(IllegalTransition {
            from: GameStatus::Build,
            to: GameStatus::GameEnd,
        });

        assert_eq!(
            status_of(ServiceError::Validation("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(illegal.into()), StatusCode::CONFLICT);
        assert_eq!(
            status_of(GameError::QuestionNotActive.into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(GameError::InvalidAnswerFormat("x".into()).into()),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(GameError::Unauthorized("x".into()).into()),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_of(ServiceError::TransactionConflict {
                game_id: Uuid::nil(),
                attempts: 3
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(ServiceError::Degraded),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn conflicts_carry_distinct_codes() {
        let cases = [
            (
                ServiceError::InvalidState("x".into()),
                ErrorCode::InvalidState,
            ),
            (
                ServiceError::AlreadyAnswered(Uuid::nil()),
                ErrorCode::AlreadyAnswered,
            ),
            (ServiceError::QuestionNotActive, ErrorCode::QuestionNotActive),
            (
                ServiceError::TransactionConflict {
                    game_id: Uuid::nil(),
                    attempts: 3,
                },
                ErrorCode::TransactionConflict,
            ),
            (ServiceError::Degraded, ErrorCode::Degraded),
        ];
        for (err, code) in cases {
            assert_eq!(AppError::from(err).code(), code);
        }
    }

    #[tokio::test]
    async fn error_body_exposes_the_code() {
        let response = AppError::from(ServiceError::QuestionNotActive).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["code"], "question_not_active");
        assert!(body["message"].as_str().is_some());
    }
}
