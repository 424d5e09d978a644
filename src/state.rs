// ==============================================================================
// state.rs - Application State Management
// ==============================================================================
// Description: Shared application state for the auth gateway
// Author: Matt Barham
// Created: 2025-11-06
// Modified: 2026-10-19
// Version: 2.0.0
// ==============================================================================

use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::rate_limit::RateLimiter;
use crate::store::UserStore;
use crate::token::{RevocationStore, TokenService};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Arc<Config>,
    clock: Arc<dyn Clock>,
    tokens: TokenService,
    limiter: RateLimiter,
    users: Arc<dyn UserStore>,
}

impl AppState {
    /// Build state with the system clock
    pub fn new(config: Arc<Config>, users: Arc<dyn UserStore>) -> Self {
        Self::with_clock(config, users, Arc::new(SystemClock))
    }

    /// Build state with an explicit clock
    pub fn with_clock(
        config: Arc<Config>,
        users: Arc<dyn UserStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let revocations = Arc::new(RevocationStore::new());
        let tokens = TokenService::new(&config.governance, revocations, clock.clone());
        let limiter = RateLimiter::new(&config.governance);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                clock,
                tokens,
                limiter,
                users,
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn clock(&self) -> &dyn Clock {
        self.inner.clock.as_ref()
    }

    pub fn tokens(&self) -> &TokenService {
        &self.inner.tokens
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.inner.limiter
    }

    pub fn users(&self) -> &dyn UserStore {
        self.inner.users.as_ref()
    }

    /// Evict expired revocations and idle rate-limit buckets
    pub fn sweep(&self) -> (usize, usize) {
        let now = self.clock().now();
        let revocations = self.tokens().revocations().sweep(now);
        let buckets = self.limiter().evict_idle(now);
        (revocations, buckets)
    }
}
