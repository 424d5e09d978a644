// ==============================================================================
// rate_limit.rs - Fixed-Window Rate Limiter
// ==============================================================================
// Description: Per-client admission control using fixed-window counters
// Author: Matt Barham
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================
// Algorithm (per key):
//   1. Bucket absent, or now - window_start >= window -> reset to {now, 0}
//   2. count += 1
//   3. count > threshold -> reject, else admit
//
// The read-modify-write runs under the write lock of the key's shard, so
// concurrent admits for one key never lose increments. Keys in other shards
// proceed in parallel.
// ==============================================================================

use chrono::{DateTime, TimeDelta, Utc};
use std::time::Duration;
use tracing::debug;

use crate::config::GovernanceConfig;
use crate::shard::{ShardedMap, DEFAULT_SHARDS};

/// Buckets untouched for this many windows are evicted by `evict_idle`
const IDLE_WINDOWS_BEFORE_EVICTION: i32 = 3;

#[derive(Debug, Clone, Copy)]
struct Bucket {
    window_start: DateTime<Utc>,
    count: u64,
}

/// Outcome of an admission check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Admitted { remaining: u32 },
    Rejected { retry_after: Duration },
}

impl Decision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Decision::Admitted { .. })
    }
}

pub struct RateLimiter {
    window: TimeDelta,
    threshold: u32,
    buckets: ShardedMap<String, Bucket>,
}

impl RateLimiter {
    pub fn new(config: &GovernanceConfig) -> Self {
        Self::with_shards(config, DEFAULT_SHARDS)
    }

    pub fn with_shards(config: &GovernanceConfig, shards: usize) -> Self {
        Self {
            window: TimeDelta::from_std(config.rate_window).unwrap_or(TimeDelta::MAX),
            threshold: config.rate_threshold,
            buckets: ShardedMap::new(shards),
        }
    }

    /// Count one request for `key` at `now` and decide admission
    pub fn admit(&self, key: &str, now: DateTime<Utc>) -> Decision {
        let mut shard = self.buckets.shard_for(key).write();

        let bucket = shard.entry(key.to_string()).or_insert(Bucket {
            window_start: now,
            count: 0,
        });

        if now.signed_duration_since(bucket.window_start) >= self.window {
            *bucket = Bucket {
                window_start: now,
                count: 0,
            };
        }

        bucket.count += 1;

        if bucket.count > u64::from(self.threshold) {
            let elapsed = now.signed_duration_since(bucket.window_start);
            let retry_after = self
                .window
                .checked_sub(&elapsed)
                .and_then(|left| left.to_std().ok())
                .unwrap_or(Duration::ZERO);

            return Decision::Rejected { retry_after };
        }

        let remaining = u64::from(self.threshold) - bucket.count;
        Decision::Admitted {
            remaining: remaining as u32,
        }
    }

    /// Requests counted for `key` in its current window (0 if untracked)
    pub fn count(&self, key: &str) -> u64 {
        self.buckets
            .shard_for(key)
            .read()
            .get(key)
            .map(|b| b.count)
            .unwrap_or(0)
    }

    /// Drop buckets whose window started several windows ago
    pub fn evict_idle(&self, now: DateTime<Utc>) -> usize {
        let horizon = self
            .window
            .checked_mul(IDLE_WINDOWS_BEFORE_EVICTION)
            .unwrap_or(TimeDelta::MAX);

        let removed = self
            .buckets
            .retain(|_, bucket| now.signed_duration_since(bucket.window_start) < horizon);

        if removed > 0 {
            debug!(removed, "Evicted idle rate-limit buckets");
        }
        removed
    }

    pub fn tracked_keys(&self) -> usize {
        self.buckets.len()
    }
}
