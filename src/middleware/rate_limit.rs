// ==============================================================================
// middleware/rate_limit.rs - Admission Control Stage
// ==============================================================================
// Description: Applies the fixed-window rate limiter to every request
// Author: Matt Barham
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use tracing::warn;

use crate::error::ApiError;
use crate::rate_limit::Decision;
use crate::state::AppState;

/// Key used when the peer address is unknown (e.g. in-process tests)
const UNKNOWN_CLIENT: &str = "unknown";

/// Reject the request with 429 once its client exceeds the window threshold
pub async fn enforce_rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let key = client_key(&request, state.config().server.trust_forwarded_for);
    let now = state.clock().now();

    match state.limiter().admit(&key, now) {
        Decision::Admitted { .. } => Ok(next.run(request).await),
        Decision::Rejected { retry_after } => {
            warn!(client = %key, path = %request.uri().path(), "Rate limit exceeded");
            Err(ApiError::RateLimitExceeded { retry_after })
        }
    }
}

/// Rate-limit key for a request: the peer IP, or the first X-Forwarded-For
/// hop when the gateway sits behind a trusted proxy
pub fn client_key(request: &Request, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = request
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|s| !s.is_empty());

        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}
