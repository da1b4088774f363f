//! HTTP error types and mappings.
//!
//! Every failure of the completion handler ends up here and leaves the
//! process as an [`ErrorResponse`]. The status table is closed:
//!
//! | kind | status |
//! |---|---|
//! | `validation_error` | 400 |
//! | `service_unavailable` | 503 |
//! | `internal_error` | 500 |
//!
//! Internal details are logged, never returned to the caller.

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use fmgate_core::GenerationError;
use thiserror::Error;
use tracing::{error, warn};

use crate::models::ErrorResponse;

/// Caller-facing message for internal errors.
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// Caller-facing message when the generation backend cannot be engaged.
pub const UNAVAILABLE_MESSAGE: &str = "The generation service is currently unavailable";

/// Seconds suggested to clients in `retry-after` on 503 responses.
const RETRY_AFTER_SECS: &str = "5";

/// Error classes understood by clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    ServiceUnavailable,
    Internal,
}

impl ErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation_error",
            Self::ServiceUnavailable => "service_unavailable",
            Self::Internal => "internal_error",
        }
    }

    pub const fn status(self) -> StatusCode {
        match self {
            Self::Validation => StatusCode::BAD_REQUEST,
            Self::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error produced while handling an API request.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or empty request. The message is returned to the caller.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The generation capability cannot be engaged.
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Anything else.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::ServiceUnavailable(_) => ErrorKind::ServiceUnavailable,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Body sent to the caller.
    pub fn payload(&self) -> ErrorResponse {
        let message = match self {
            Self::Validation(msg) => msg.as_str(),
            Self::ServiceUnavailable(_) => UNAVAILABLE_MESSAGE,
            Self::Internal(_) => INTERNAL_ERROR_MESSAGE,
        };
        ErrorResponse::new(message, self.kind())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            Self::Validation(msg) => warn!("Rejected request: {msg}"),
            Self::ServiceUnavailable(reason) => warn!("Generation unavailable: {reason}"),
            Self::Internal(detail) => error!("Request failed: {detail}"),
        }

        let status = self.kind().status();
        let mut response = (status, Json(self.payload())).into_response();

        if status == StatusCode::SERVICE_UNAVAILABLE {
            response.headers_mut().insert(
                header::RETRY_AFTER,
                HeaderValue::from_static(RETRY_AFTER_SECS),
            );
        }

        response
    }
}

impl From<GenerationError> for ApiError {
    fn from(err: GenerationError) -> Self {
        match err {
            GenerationError::Unavailable(reason) => Self::ServiceUnavailable(reason),
            GenerationError::Failed(reason) => Self::Internal(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_table() {
        assert_eq!(
            ApiError::Validation(String::new()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::ServiceUnavailable(String::new())
                .into_response()
                .status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::Internal(String::new()).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_detail_is_not_leaked() {
        let payload = ApiError::Internal("db password is hunter2".into()).payload();
        assert_eq!(payload.error.message, INTERNAL_ERROR_MESSAGE);
        assert_eq!(payload.error.r#type, "internal_error");
    }

    #[test]
    fn test_validation_message_is_returned() {
        let payload = ApiError::Validation("At least one message is required".into()).payload();
        assert_eq!(payload.error.message, "At least one message is required");
        assert_eq!(payload.error.r#type, "validation_error");
    }

    #[test]
    fn test_unavailable_sets_retry_after() {
        let response = ApiError::ServiceUnavailable("upstream down".into()).into_response();
        assert_eq!(response.headers()[header::RETRY_AFTER], "5");
    }

    #[test]
    fn test_from_generation_error() {
        assert_eq!(
            ApiError::from(GenerationError::Unavailable("x".into())).kind(),
            ErrorKind::ServiceUnavailable
        );
        assert_eq!(
            ApiError::from(GenerationError::Failed("x".into())).kind(),
            ErrorKind::Internal
        );
    }
}
