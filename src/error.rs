// ==============================================================================
// error.rs - Error Taxonomy & Normalization
// ==============================================================================
// Description: Typed errors for every pipeline stage and their uniform
//              client-facing representation
// Author: Matt Barham
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::time::Duration;
use thiserror::Error;
use tracing::error;

use crate::models::ErrorResponse;

/// Authentication failures
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing authorization header")]
    Missing,

    #[error("invalid token")]
    Malformed,

    #[error("token expired")]
    Expired,

    #[error("token revoked")]
    Revoked,

    #[error("invalid username or password")]
    InvalidCredentials,
}

/// User-record store failures
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("username already exists")]
    Conflict,

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict,
            _ => StoreError::Backend(err.to_string()),
        }
    }
}

/// Error returned by any stage of the request chain
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("rate limit exceeded")]
    RateLimitExceeded { retry_after: Duration },

    #[error("username already exists")]
    Conflict,

    #[error("not found")]
    NotFound,

    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict => ApiError::Conflict,
            StoreError::Backend(msg) => ApiError::Internal(msg),
        }
    }
}

/// Category of a normalized error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Auth(AuthError),
    RateLimitExceeded,
    Conflict,
    NotFound,
    MethodNotAllowed,
    Internal,
}

/// The single client-facing shape of every failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedError {
    pub kind: ErrorKind,
    pub status: StatusCode,
    pub message: String,
}

impl NormalizedError {
    /// Internal fault with no detail exposed
    pub fn internal() -> Self {
        Self {
            kind: ErrorKind::Internal,
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "internal server error".to_string(),
        }
    }

    /// Map a bare HTTP error status produced outside the typed chain
    pub fn from_status(status: StatusCode) -> Self {
        let kind = match status {
            StatusCode::NOT_FOUND => ErrorKind::NotFound,
            StatusCode::METHOD_NOT_ALLOWED => ErrorKind::MethodNotAllowed,
            StatusCode::UNAUTHORIZED => ErrorKind::Auth(AuthError::Missing),
            StatusCode::TOO_MANY_REQUESTS => ErrorKind::RateLimitExceeded,
            StatusCode::CONFLICT => ErrorKind::Conflict,
            s if s.is_server_error() => return Self::internal(),
            _ => ErrorKind::Validation,
        };

        Self {
            kind,
            status,
            message: status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_lowercase(),
        }
    }
}

impl ApiError {
    /// Translate into the uniform error shape
    ///
    /// Internal detail is logged here and never copied into the message.
    pub fn normalize(&self) -> NormalizedError {
        let (kind, status, message) = match self {
            ApiError::Validation(msg) => {
                (ErrorKind::Validation, StatusCode::BAD_REQUEST, msg.clone())
            }
            ApiError::Auth(e) => (ErrorKind::Auth(*e), StatusCode::UNAUTHORIZED, e.to_string()),
            ApiError::RateLimitExceeded { .. } => (
                ErrorKind::RateLimitExceeded,
                StatusCode::TOO_MANY_REQUESTS,
                self.to_string(),
            ),
            ApiError::Conflict => (ErrorKind::Conflict, StatusCode::CONFLICT, self.to_string()),
            ApiError::NotFound => (ErrorKind::NotFound, StatusCode::NOT_FOUND, self.to_string()),
            ApiError::MethodNotAllowed => (
                ErrorKind::MethodNotAllowed,
                StatusCode::METHOD_NOT_ALLOWED,
                self.to_string(),
            ),
            ApiError::Internal(detail) => {
                error!("Internal error: {}", detail);
                return NormalizedError::internal();
            }
        };

        NormalizedError {
            kind,
            status,
            message,
        }
    }
}

impl IntoResponse for NormalizedError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorResponse::new(self.message))).into_response()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = self.normalize().into_response();

        if let ApiError::RateLimitExceeded { retry_after } = self {
            // Round up so clients never retry inside the same window
            let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            if let Ok(value) = HeaderValue::from_str(&secs.max(1).to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        response
    }
}
