//! API error types for mimg-gen
//!
//! Every error renders as `{"error": true, "message": ...}`. Authentication
//! failures stay deliberately opaque: the body never reveals whether a
//! username exists or a key's fast digest matched.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use mimg_common::auth::AuthFailure;
use serde_json::json;
use thiserror::Error;

use crate::services::resolver::ResolveError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("{0}")]
    BadRequest(String),

    /// Authentication failure (401)
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated but not allowed (403)
    #[error("{0}")]
    Forbidden(String),

    /// Resource not found (404)
    #[error("{0}")]
    NotFound(String),

    /// Conflict (409) - e.g., duplicate username, last admin key
    #[error("{0}")]
    Conflict(String),

    /// Upstream provider failure (502)
    #[error("{0}")]
    BadGateway(String),

    /// Internal server error (500); detail is logged, not returned
    #[error("Internal server error")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            ApiError::Internal(detail) => {
                tracing::error!("internal error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": true,
            "message": message,
        }));

        (status, body).into_response()
    }
}

impl From<AuthFailure> for ApiError {
    fn from(failure: AuthFailure) -> Self {
        match failure {
            // Undecodable Basic credentials are a client formatting error
            AuthFailure::MalformedHeader => ApiError::BadRequest(failure.to_string()),
            AuthFailure::MissingHeader | AuthFailure::UnsupportedScheme => {
                ApiError::Unauthorized(failure.to_string())
            }
            AuthFailure::InvalidCredential => {
                ApiError::Unauthorized("Invalid credentials".to_string())
            }
        }
    }
}

impl From<mimg_common::Error> for ApiError {
    fn from(e: mimg_common::Error) -> Self {
        match e {
            mimg_common::Error::NotFound(msg) => ApiError::NotFound(msg),
            mimg_common::Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<ResolveError> for ApiError {
    fn from(e: ResolveError) -> Self {
        match e {
            ResolveError::UnsupportedSource(msg) => ApiError::BadRequest(msg),
            ResolveError::InvalidId => ApiError::BadRequest("invalid track id".to_string()),
            ResolveError::NotFound => ApiError::NotFound("track not found".to_string()),
            // Upstream detail goes to the log; the client gets a stable body
            ResolveError::TokenAcquisition(err) => {
                tracing::warn!("token acquisition failed: {}", err);
                ApiError::BadGateway("provider authorization failed".to_string())
            }
            ResolveError::TokenRejected => {
                ApiError::BadGateway("provider rejected our credentials".to_string())
            }
            ResolveError::Upstream(msg) => {
                tracing::warn!("provider request failed: {}", msg);
                ApiError::BadGateway("provider request failed".to_string())
            }
            ResolveError::InvalidPayload(msg) => {
                tracing::warn!("provider payload invalid: {}", msg);
                ApiError::BadGateway("provider returned an invalid payload".to_string())
            }
        }
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
