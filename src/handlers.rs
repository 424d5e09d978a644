// ==============================================================================
// handlers.rs - API Request Handlers
// ==============================================================================
// Description: HTTP request handlers for account and session endpoints
// Author: Matt Barham
// Created: 2025-11-06
// Modified: 2026-10-19
// Version: 2.0.0
// ==============================================================================

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    error::{ApiError, AuthError},
    extract::ValidatedJson,
    middleware::{AuthUser, BearerToken},
    models::*,
    security::{hash_password, verify_dummy, verify_password},
    state::AppState,
    store::NewUser,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");

const ENDPOINTS: &[&str] = &[
    "POST /register - Create an account",
    "POST /login - Obtain a bearer token",
    "POST /logout - Revoke the presented bearer token",
    "GET /protected - Example authenticated route",
    "GET /health - Health check",
    "GET /ready - Readiness check",
];

/// Root endpoint - login page redirect or API information
pub async fn root(State(state): State<AppState>) -> Response {
    if state.config().server.login_page {
        return Redirect::temporary("/auth/login").into_response();
    }

    Json(ServiceInfoResponse {
        ok: true,
        service: "Auth Gateway",
        version: VERSION,
        endpoints: ENDPOINTS,
    })
    .into_response()
}

/// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        status: "ok",
        version: VERSION,
        timestamp: Utc::now(),
    })
}

/// Readiness check endpoint
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let user_store = match state.users().ping().await {
        Ok(()) => true,
        Err(e) => {
            warn!("User store not ready: {}", e);
            false
        }
    };

    let status = if user_store {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadinessResponse {
            ok: user_store,
            user_store,
            error: (!user_store).then_some("user store unavailable"),
        }),
    )
}

/// Register a new account
///
/// "Not found" from the lookup means the name is free; any storage fault is
/// an internal error, never treated as "no conflict".
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<CredentialsRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let username = request.normalized_username();

    if state.users().find_by_username(&username).await?.is_some() {
        info!(username = %username, "Registration rejected: username taken");
        return Err(ApiError::Conflict);
    }

    let password = request.password;
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ApiError::Internal(format!("Password hashing task failed: {}", e)))?
        .map_err(|e| ApiError::Internal(format!("{:#}", e)))?;

    // A concurrent registration can still win the race; the store reports
    // it as Conflict
    let id = state
        .users()
        .create_user(NewUser {
            id: Uuid::new_v4(),
            username: username.clone(),
            password_hash,
        })
        .await?;

    info!(user_id = %id, username = %username, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            ok: true,
            id,
            username,
        }),
    ))
}

/// Exchange username/password for a bearer credential
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let username = request.normalized_username();

    let Some(user) = state.users().find_by_username(&username).await? else {
        let password = request.password;
        tokio::task::spawn_blocking(move || verify_dummy(&password))
            .await
            .map_err(|e| ApiError::Internal(format!("Password verification task failed: {}", e)))?
            .map_err(|e| ApiError::Internal(format!("{:#}", e)))?;

        warn!(username = %username, "Login failed: unknown user");
        return Err(AuthError::InvalidCredentials.into());
    };

    let password = request.password;
    let password_hash = user.password_hash.clone();
    let valid = tokio::task::spawn_blocking(move || verify_password(&password, &password_hash))
        .await
        .map_err(|e| ApiError::Internal(format!("Password verification task failed: {}", e)))?
        .map_err(|e| ApiError::Internal(format!("{:#}", e)))?;

    if !valid {
        warn!(username = %username, "Login failed: wrong password");
        return Err(AuthError::InvalidCredentials.into());
    }

    let issued = state.tokens().issue(&user.id.to_string())?;
    info!(user_id = %user.id, token_id = %issued.token_id, "User logged in");

    Ok(Json(LoginResponse {
        ok: true,
        token: issued.token,
        expires_at: issued.expires_at,
    }))
}

/// Revoke the presented credential
///
/// Idempotent: an already revoked or expired credential still logs out
/// successfully as long as its signature is valid.
pub async fn logout(
    State(state): State<AppState>,
    BearerToken(credential): BearerToken,
) -> Result<Json<MessageResponse>, ApiError> {
    state.tokens().revoke(&credential)?;
    Ok(Json(MessageResponse::new("logged out")))
}

/// Example protected route
pub async fn protected(AuthUser(claims): AuthUser) -> Json<ProtectedResponse> {
    Json(ProtectedResponse {
        ok: true,
        message: "This is a protected route!",
        subject: claims.subject,
    })
}

/// Fallback for unmatched routes
pub async fn not_found() -> ApiError {
    ApiError::NotFound
}
