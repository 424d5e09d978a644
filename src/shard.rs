// ==============================================================================
// shard.rs - Key-Hash Sharded Map
// ==============================================================================
// Description: Splits a concurrent map into independently locked shards so
//              unrelated keys never contend on the same lock
// Author: Matt Barham
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================

use parking_lot::RwLock;
use std::collections::hash_map::RandomState;
use std::collections::HashMap;
use std::hash::{BuildHasher, Hash};

pub const DEFAULT_SHARDS: usize = 16;

/// HashMap partitioned by key hash, one `RwLock` per shard
pub struct ShardedMap<K, V> {
    shards: Box<[RwLock<HashMap<K, V>>]>,
    hasher: RandomState,
}

impl<K, V> ShardedMap<K, V>
where
    K: Eq + Hash,
{
    /// `shards` is rounded up to a power of two (minimum 1)
    pub fn new(shards: usize) -> Self {
        let count = shards.max(1).next_power_of_two();
        let shards = (0..count).map(|_| RwLock::new(HashMap::new())).collect();

        Self {
            shards,
            hasher: RandomState::new(),
        }
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Shard owning `key`
    pub fn shard_for<Q>(&self, key: &Q) -> &RwLock<HashMap<K, V>>
    where
        Q: Hash + ?Sized,
    {
        let hash = self.hasher.hash_one(key) as usize;
        &self.shards[hash & (self.shards.len() - 1)]
    }

    /// Shard by index, for incremental sweeps
    pub fn shard(&self, index: usize) -> &RwLock<HashMap<K, V>> {
        &self.shards[index % self.shards.len()]
    }

    /// Drop entries failing `keep`, locking one shard at a time
    ///
    /// Returns the number of entries removed.
    pub fn retain<F>(&self, mut keep: F) -> usize
    where
        F: FnMut(&K, &V) -> bool,
    {
        let mut removed = 0;
        for shard in self.shards.iter() {
            let mut guard = shard.write();
            let before = guard.len();
            guard.retain(|k, v| keep(k, v));
            removed += before - guard.len();
        }
        removed
    }

    /// Total entries across shards (not an atomic snapshot)
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.read().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> Default for ShardedMap<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new(DEFAULT_SHARDS)
    }
}
