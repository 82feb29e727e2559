use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::{
    dao::storage::StorageError,
    state::{AbortError, ApplyError, PlanError, state_machine::QuizPhase},
};

/// Failures of the quiz services, before they are turned into HTTP answers.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The quiz store rejected or never answered the request.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// The server runs without a quiz store.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// Caller did not identify itself.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Caller is known but lacks the privilege for this action.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// The request body or path does not describe a usable value.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// No quiz has been published, so there is nothing to act on.
    #[error("no quiz session is active")]
    NoSession,
    /// The session exists but its phase turns newcomers away.
    #[error("the session is {0:?} and no longer accepts participants")]
    SessionClosed(QuizPhase),
    /// The host asked for a phase change the current phase does not allow.
    #[error("{0}")]
    PhaseRejected(#[from] PlanError),
    /// A planned phase change lost a race with another mutation.
    #[error("phase transition interrupted: {0}")]
    TransitionLost(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// The state lock or transition gate could not be taken in time.
    #[error("operation timed out")]
    Timeout,
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

impl From<ApplyError> for ServiceError {
    fn from(err: ApplyError) -> Self {
        ServiceError::TransitionLost(err.to_string())
    }
}

impl From<AbortError> for ServiceError {
    fn from(err: AbortError) -> Self {
        ServiceError::TransitionLost(err.to_string())
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// HTTP-facing errors; each maps to one status code and a `{message}` body.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed or invalid request.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Missing caller identity.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Caller lacks the required role.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// The request does not fit the session's current phase.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Storage is unreachable or the server is degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        let message = err.to_string();
        match err {
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Degraded | ServiceError::Timeout => AppError::ServiceUnavailable(message),
            ServiceError::Unauthorized(message) => AppError::Unauthorized(message),
            ServiceError::Forbidden(message) => AppError::Forbidden(message),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
            ServiceError::NoSession => AppError::NotFound(message),
            ServiceError::SessionClosed(_)
            | ServiceError::PhaseRejected(_)
            | ServiceError::TransitionLost(_) => AppError::Conflict(message),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::state_machine::{InvalidTransition, QuizEvent};

    fn status_of(err: ServiceError) -> StatusCode {
        AppError::from(err).status()
    }

    #[test]
    fn session_lifecycle_failures_are_conflicts() {
        assert_eq!(status_of(ServiceError::SessionClosed(QuizPhase::Ended)), StatusCode::CONFLICT);
        assert_eq!(
            status_of(ServiceError::from(PlanError::AlreadyPending)),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(ServiceError::from(ApplyError::NoPending)),
            StatusCode::CONFLICT
        );
        assert_eq!(status_of(ServiceError::NoSession), StatusCode::NOT_FOUND);
        assert_eq!(status_of(ServiceError::Degraded), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn rejected_phase_change_names_event_and_phase() {
        let err = ServiceError::from(PlanError::InvalidTransition(InvalidTransition {
            from: QuizPhase::Lobby,
            event: QuizEvent::Reveal,
        }));
        let AppError::Conflict(message) = AppError::from(err) else {
            panic!("expected a conflict");
        };
        assert!(message.contains("Reveal"));
        assert!(message.contains("Lobby"));
    }
}
