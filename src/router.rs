// ==============================================================================
// router.rs - Request Chain Assembly
// ==============================================================================
// Description: Routes plus the fixed middleware order applied to them
// Author: Matt Barham
// Created: 2025-11-06
// Modified: 2026-10-19
// Version: 2.0.0
// ==============================================================================
// Execution order per request (outermost first):
//   CORS -> panic recovery -> error normalizer -> trace span ->
//   request logging -> rate limit -> [auth, protected routes only] -> handler
// ==============================================================================

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use tracing::warn;

use crate::{handlers, middleware as mw, state::AppState};

/// Credential requests are tiny; larger bodies fail extraction
const MAX_BODY_BYTES: usize = 16 * 1024;

pub fn build_router(state: AppState) -> Router {
    // Routes behind AuthMiddleware
    let protected_routes = Router::new()
        .route("/protected", get(handlers::protected))
        .route_layer(middleware::from_fn_with_state(state.clone(), mw::require_auth));

    // Logout authenticates itself so that repeated logouts stay idempotent
    let public_routes = Router::new()
        .route("/", get(handlers::root))
        .route("/register", post(handlers::register))
        .route("/login", post(handlers::login))
        .route("/logout", post(handlers::logout))
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check));

    let mut app = Router::new().merge(public_routes).merge(protected_routes);

    let server = state.config().server.clone();
    if server.login_page {
        app = app
            .route_service("/auth/login", ServeFile::new(server.static_dir.join("index.html")))
            .nest_service("/static", ServeDir::new(&server.static_dir));
    }

    app.fallback(handlers::not_found)
        .layer(
            ServiceBuilder::new()
                .layer(cors_layer(&server.cors_allowed_origins))
                .layer(CatchPanicLayer::custom(mw::handle_panic))
                .layer(middleware::from_fn(mw::normalize_errors))
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn(mw::log_requests))
                .layer(middleware::from_fn_with_state(state.clone(), mw::enforce_rate_limit))
                .layer(DefaultBodyLimit::max(MAX_BODY_BYTES)),
        )
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed_origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_credentials(false)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::AUTHORIZATION])
        .expose_headers([header::CONTENT_TYPE, header::RETRY_AFTER])
}
