// ==============================================================================
// token/revocation.rs - Revocation Store
// ==============================================================================
// Description: Side-table of logged-out credential IDs, kept only until each
//              credential would have expired anyway
// Author: Matt Barham
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================
//
// `contains` sits on the hot path of every authenticated request, so the
// table is sharded by token ID and read under shared locks. Sweeping locks
// one shard at a time; no lock is ever held across the whole table.
//
// ==============================================================================

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;
use uuid::Uuid;

use crate::shard::{ShardedMap, DEFAULT_SHARDS};

/// Every Nth insertion sweeps one shard lazily
const LAZY_SWEEP_EVERY: u64 = 256;

pub struct RevocationStore {
    entries: ShardedMap<Uuid, DateTime<Utc>>,
    inserts: AtomicU64,
}

impl RevocationStore {
    pub fn new() -> Self {
        Self {
            entries: ShardedMap::new(DEFAULT_SHARDS),
            inserts: AtomicU64::new(0),
        }
    }

    /// Record `token_id` as revoked until `expires_at`
    ///
    /// Re-adding an ID keeps the later expiry.
    pub fn add(&self, token_id: Uuid, expires_at: DateTime<Utc>, now: DateTime<Utc>) {
        {
            let mut shard = self.entries.shard_for(&token_id).write();
            let entry = shard.entry(token_id).or_insert(expires_at);
            if *entry < expires_at {
                *entry = expires_at;
            }
        }

        let n = self.inserts.fetch_add(1, Ordering::Relaxed) + 1;
        if n % LAZY_SWEEP_EVERY == 0 {
            let index = (n / LAZY_SWEEP_EVERY) as usize;
            self.sweep_shard(index, now);
        }
    }

    pub fn contains(&self, token_id: &Uuid) -> bool {
        self.entries.shard_for(token_id).read().contains_key(token_id)
    }

    /// Remove every entry with `expires_at <= now`, one shard at a time
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let removed = self.entries.retain(|_, expires_at| *expires_at > now);
        if removed > 0 {
            debug!(removed, "Swept expired revocations");
        }
        removed
    }

    fn sweep_shard(&self, index: usize, now: DateTime<Utc>) {
        self.entries
            .shard(index)
            .write()
            .retain(|_, expires_at| *expires_at > now);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for RevocationStore {
    fn default() -> Self {
        Self::new()
    }
}
