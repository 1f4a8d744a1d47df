use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use promptsync_core::validation::{FieldError, ValidationErrors};
use serde::Serialize;
use thiserror::Error;

pub const INVALID_BODY: &str = "Invalid request body";
pub const INVALID_QUERY: &str = "Invalid query parameters";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{message}")]
    Validation {
        message: &'static str,
        details: Vec<FieldError>,
    },
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Too many requests: {0}")]
    TooManyRequests(String, u64),
    #[error("Internal server error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    details: Vec<FieldError>,
}

impl AppError {
    pub fn validation(message: &'static str, errors: ValidationErrors) -> Self {
        Self::Validation {
            message,
            details: errors.errors().to_vec(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn too_many_requests(message: impl Into<String>, retry_after_secs: u64) -> Self {
        Self::TooManyRequests(message.into(), retry_after_secs)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Map an engine error; validation failures become 400 with `message`
    pub fn from_sync(error: promptsync_core::Error, message: &'static str) -> Self {
        match error {
            promptsync_core::Error::Validation(errors) => Self::validation(message, errors),
            other => Self::internal(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details, retry_after) = match self {
            Self::Validation { message, details } => {
                (StatusCode::BAD_REQUEST, message, details, None)
            }
            Self::Unauthorized(reason) => {
                tracing::debug!(reason = %reason, "Rejected request");
                (StatusCode::UNAUTHORIZED, "Unauthorized", Vec::new(), None)
            }
            Self::TooManyRequests(_, retry_after_secs) => (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests",
                Vec::new(),
                Some(retry_after_secs),
            ),
            error @ Self::Internal(_) => {
                tracing::error!(error = %error, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error",
                    Vec::new(),
                    None,
                )
            }
        };

        let body = ErrorBody {
            success: false,
            error,
            details,
        };
        let mut response = (status, Json(body)).into_response();
        if let Some(seconds) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(seconds.max(1)));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_response_sets_retry_after() {
        let response = AppError::too_many_requests("slow down", 12).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "12");
    }

    #[test]
    fn internal_errors_map_to_500() {
        let error = AppError::from_sync(
            promptsync_core::Error::Storage("disk full".to_string()),
            INVALID_BODY,
        );
        assert!(matches!(error, AppError::Internal(_)));
        assert_eq!(
            error.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn validation_errors_keep_details() {
        let error = AppError::from_sync(
            promptsync_core::Error::Validation(ValidationErrors::single("limit", "too big")),
            INVALID_QUERY,
        );
        let AppError::Validation { message, details } = error else {
            panic!("expected validation error");
        };
        assert_eq!(message, INVALID_QUERY);
        assert_eq!(details[0].field, "limit");
    }
}
