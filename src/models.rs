// ==============================================================================
// models.rs - API Data Models
// ==============================================================================
// Description: Request/response models for the auth gateway
// Author: Matt Barham
// Created: 2025-11-06
// Modified: 2026-10-19
// Version: 2.0.0
// ==============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Username/password pair posted to /register and /login
#[derive(Debug, Deserialize, Validate)]
pub struct CredentialsRequest {
    #[validate(
        length(min = 3, max = 32, message = "username must be 3-32 characters"),
        custom(function = "validate_username_charset")
    )]
    pub username: String,

    #[validate(length(min = 8, max = 128, message = "password must be 8-128 characters"))]
    pub password: String,
}

impl CredentialsRequest {
    /// Usernames are compared case-insensitively everywhere
    pub fn normalized_username(&self) -> String {
        normalize_username(&self.username)
    }
}

/// Username/password pair posted to /login
///
/// Only presence is checked; registration rules may change without locking
/// out existing accounts.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "username is required"))]
    pub username: String,

    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

impl LoginRequest {
    pub fn normalized_username(&self) -> String {
        normalize_username(&self.username)
    }
}

pub fn normalize_username(username: &str) -> String {
    username.trim().to_lowercase()
}

fn validate_username_charset(username: &str) -> Result<(), ValidationError> {
    let ok = username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));

    if ok {
        Ok(())
    } else {
        let mut err = ValidationError::new("username_charset");
        err.message = Some("username may only contain letters, digits, '_', '.' and '-'".into());
        Err(err)
    }
}

/// Successful registration
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub ok: bool,
    pub id: Uuid,
    pub username: String,
}

/// Successful login
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub ok: bool,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Generic success with a human-readable message
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub ok: bool,
    pub message: &'static str,
}

impl MessageResponse {
    pub fn new(message: &'static str) -> Self {
        Self { ok: true, message }
    }
}

/// Protected resource payload
#[derive(Debug, Serialize)]
pub struct ProtectedResponse {
    pub ok: bool,
    pub message: &'static str,
    pub subject: String,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub status: &'static str,
    pub version: &'static str,
    pub timestamp: DateTime<Utc>,
}

/// Readiness check response
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub ok: bool,
    pub user_store: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
}

/// Root endpoint response when no login page is served
#[derive(Debug, Serialize)]
pub struct ServiceInfoResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
    pub endpoints: &'static [&'static str],
}

/// Error response
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub ok: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: error.into(),
        }
    }
}
