// ==============================================================================
// lib.rs - Auth Gateway Library
// ==============================================================================
// Description: Library interface for the authentication and request
//              governance gateway
// Author: Matt Barham
// Created: 2025-11-03
// Modified: 2026-10-19
// Version: 2.0.0
// ==============================================================================

pub mod clock;
pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod rate_limit;
pub mod router;
pub mod security;
pub mod shard;
pub mod state;
pub mod store;
pub mod token;

pub use router::build_router;
pub use state::AppState;
