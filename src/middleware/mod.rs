// ==============================================================================
// middleware/mod.rs - Request Governance Middleware
// ==============================================================================
// Description: Error recovery, request logging, rate limiting and bearer
//              authentication stages of the request chain
// Author: Matt Barham
// Created: 2026-01-11
// Modified: 2026-10-19
// Version: 2.0.0
// ==============================================================================

pub mod auth;
pub mod logging;
pub mod rate_limit;
pub mod recovery;

pub use auth::{require_auth, AuthUser, BearerToken};
pub use logging::log_requests;
pub use rate_limit::enforce_rate_limit;
pub use recovery::{handle_panic, normalize_errors};
