/**
 * API Error Type
 *
 * This module defines `ApiError`, the single error type returned by every
 * HTTP handler. Each variant maps to an HTTP status code, and the
 * `IntoResponse` implementation renders the uniform error body:
 *
 * ```json
 * { "success": false, "message": "..." }
 * ```
 *
 * # Error Categories
 *
 * Domain errors (`BadRequest`, `Unauthorized`, `Forbidden`, `NotFound`,
 * `Conflict`) carry a message intended for the client. Infrastructure
 * errors (`Database`, `Serialization`, `Internal`) are logged with full
 * detail and rendered to the client as a generic message so internals
 * never leak.
 */

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Result alias used by handlers and database operations
pub type ApiResult<T> = Result<T, ApiError>;

/// All errors a request handler can surface
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or invalid request input
    #[error("{0}")]
    BadRequest(String),

    /// Missing, expired or invalid credentials
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated but not allowed to perform the operation
    #[error("{0}")]
    Forbidden(String),

    /// Referenced document does not exist
    #[error("{0}")]
    NotFound(String),

    /// Uniqueness or state conflict (duplicate username, pending invite, ...)
    #[error("{0}")]
    Conflict(String),

    /// Upload exceeds the configured size limit
    #[error("payload too large")]
    PayloadTooLarge,

    /// MongoDB driver failure
    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),

    /// BSON (de)serialization failure
    #[error("serialization error: {0}")]
    Serialization(#[from] mongodb::bson::ser::Error),

    /// Anything else that should never reach the client verbatim
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Database(_) | Self::Serialization(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message rendered to the client. Infrastructure errors are masked.
    pub fn client_message(&self) -> String {
        match self {
            Self::Database(_) | Self::Serialization(_) | Self::Internal(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<mongodb::bson::de::Error> for ApiError {
    fn from(err: mongodb::bson::de::Error) -> Self {
        Self::Internal(format!("bson decode: {err}"))
    }
}

impl From<bcrypt::BcryptError> for ApiError {
    fn from(err: bcrypt::BcryptError) -> Self {
        Self::Internal(format!("bcrypt: {err}"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("request failed: {:?}", self);
        } else {
            tracing::debug!("request rejected ({}): {}", status, self);
        }

        let body = Json(json!({
            "success": false,
            "message": self.client_message(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_domain_error_status_codes() {
        assert_eq!(
            ApiError::bad_request("x").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::unauthorized("x").status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ApiError::forbidden("x").status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::not_found("x").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::conflict("x").status_code(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::PayloadTooLarge.status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }

    #[test]
    fn test_domain_errors_keep_their_message() {
        let err = ApiError::not_found("Post not found");
        assert_eq!(err.client_message(), "Post not found");
    }

    #[test]
    fn test_internal_errors_are_masked() {
        let err = ApiError::internal("connection pool exhausted at 10.0.0.3");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.client_message(), "Internal server error");
        assert!(!err.client_message().contains("10.0.0.3"));
    }

    #[test]
    fn test_error_body_shape() {
        let response = ApiError::forbidden("You are banned from this subreddit").into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
