// ==============================================================================
// middleware/recovery.rs - Error Normalizer
// ==============================================================================
// Description: Chain boundary that turns every failure into the uniform
//              `{ ok: false, error }` JSON body
// Author: Matt Barham
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================
//
// Typed stages already render `ApiError` as JSON. What reaches this layer
// un-normalized is produced outside the typed chain: router 404/405,
// body-limit 413, and panics (caught by CatchPanicLayer via `handle_panic`).
//
// ==============================================================================

use axum::{
    extract::Request,
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::any::Any;
use tracing::error;

use crate::error::NormalizedError;

/// Headers worth keeping when an error body is replaced
const PRESERVED_HEADERS: [header::HeaderName; 3] =
    [header::ALLOW, header::RETRY_AFTER, header::WWW_AUTHENTICATE];

/// Panic handler for `CatchPanicLayer`
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s
    } else {
        "non-string panic payload"
    };

    error!("Request handler panicked: {}", detail);

    NormalizedError::internal().into_response()
}

/// Rewrite non-JSON error responses into the uniform error shape
pub async fn normalize_errors(request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    let status = response.status();

    if !(status.is_client_error() || status.is_server_error()) || is_json(response.headers()) {
        return response;
    }

    if status.is_server_error() {
        error!(status = status.as_u16(), "Un-typed server error normalized");
    }

    let mut normalized = NormalizedError::from_status(status).into_response();
    for name in PRESERVED_HEADERS {
        if let Some(value) = response.headers().get(&name) {
            normalized.headers_mut().insert(name, value.clone());
        }
    }

    normalized
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.starts_with("application/json"))
        .unwrap_or(false)
}
