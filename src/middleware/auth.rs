// ==============================================================================
// middleware/auth.rs - Bearer Authentication Middleware
// ==============================================================================
// Description: Extract and validate bearer credentials on protected routes
// Author: Matt Barham
// Created: 2026-01-11
// Modified: 2026-10-19
// Version: 2.0.0
// ==============================================================================
//
// `require_auth` is attached with `route_layer` to protected routes only.
// It reads `Authorization: Bearer <credential>`, validates it through the
// token service (signature, expiry, revocation) and stores the verified
// claims in request extensions. Handlers take them via the `AuthUser`
// extractor. On failure the handler is never invoked.
//
// ==============================================================================

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::error::{ApiError, AuthError};
use crate::state::AppState;
use crate::token::Claims;

const BEARER_SCHEME: &str = "bearer";

/// Authenticated caller resolved by `require_auth`
///
/// # Example
/// ```rust,ignore
/// async fn my_handler(AuthUser(claims): AuthUser) -> impl IntoResponse {
///     format!("Hello, {}!", claims.subject)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

/// Raw bearer credential from the Authorization header
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

/// Pull the credential out of `Authorization: Bearer <credential>`
///
/// Absent or blank header is `Missing`; any other scheme or an
/// undecodable header value is `Malformed`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::Missing)?
        .to_str()
        .map_err(|_| AuthError::Malformed)?
        .trim();

    if value.is_empty() {
        return Err(AuthError::Missing);
    }

    let (scheme, credential) = value.split_once(' ').ok_or(AuthError::Malformed)?;
    if !scheme.eq_ignore_ascii_case(BEARER_SCHEME) {
        return Err(AuthError::Malformed);
    }

    let credential = credential.trim();
    if credential.is_empty() {
        return Err(AuthError::Missing);
    }

    Ok(credential)
}

/// Authentication stage for protected routes
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let credential = bearer_token(request.headers())
        .map_err(|e| {
            warn!(path = %request.uri().path(), reason = %e, "Authentication failed");
            e
        })?
        .to_owned();

    let claims = state.tokens().validate(&credential).map_err(|e| {
        warn!(path = %request.uri().path(), reason = %e, "Authentication failed");
        e
    })?;

    request.extensions_mut().insert(AuthUser(claims));
    request.extensions_mut().insert(BearerToken(credential));

    Ok(next.run(request).await)
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(ApiError::Auth(AuthError::Missing))
    }
}

impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(token) = parts.extensions.get::<BearerToken>() {
            return Ok(token.clone());
        }

        let credential = bearer_token(&parts.headers)?;
        Ok(BearerToken(credential.to_owned()))
    }
}
