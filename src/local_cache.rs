//! Process local cache of keys known to be over limit.
//!
//! A hit lets the engine answer "over limit" without a counter store round trip. The
//! cache is advisory: a missing entry costs one extra store call, never a wrong
//! decision beyond what the store's own count dictates.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use dashmap::DashMap;

use crate::{LocalCacheCapacity, LocalCacheStats, TimeSource};

// A full cache evicts down to `capacity - capacity / EVICTION_BATCH_DIVISOR` entries.
const EVICTION_BATCH_DIVISOR: usize = 10;

/// Bounded, TTL based cache of over limit window keys.
pub trait LocalCache: Send + Sync {
    /// Expiry (unix seconds) of the live entry for `key`, if any.
    fn get(&self, key: &str) -> Option<u64>;

    /// Insert or refresh `key` for `ttl_seconds`.
    fn set(&self, key: &str, ttl_seconds: u64);

    /// Approximate number of entries held.
    fn len(&self) -> usize;

    /// Whether the cache holds no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Counter snapshot for an external metrics collector.
    fn stats(&self) -> LocalCacheStats;
}

#[derive(Debug, Default)]
struct LocalCacheCounters {
    hit: AtomicU64,
    miss: AtomicU64,
    expired: AtomicU64,
    overwrite: AtomicU64,
    evacuate: AtomicU64,
}

/// [`LocalCache`] over a [`DashMap`] with lazy expiry.
///
/// When full, expired entries are dropped first. If the cache is still above its low
/// water mark (90% of capacity, at least one free slot), the entries closest to expiry
/// are evicted down to it in the same pass, so a sweep runs at most once per batch of
/// inserts. Capacity is a soft bound under concurrent inserts.
pub struct TtlLocalCache {
    capacity: LocalCacheCapacity,
    entries: DashMap<String, u64>,
    time_source: Arc<dyn TimeSource>,
    counters: LocalCacheCounters,
}

impl TtlLocalCache {
    /// Create an empty cache holding at most `capacity` entries.
    pub fn new(capacity: LocalCacheCapacity, time_source: Arc<dyn TimeSource>) -> Self {
        Self {
            capacity,
            entries: DashMap::new(),
            time_source,
            counters: LocalCacheCounters::default(),
        }
    }

    fn make_room(&self, now: u64) {
        if self.entries.len() < *self.capacity {
            return;
        }

        self.entries.retain(|_, expires_at| *expires_at > now);

        // Free a batch of slots so the following inserts skip this sweep.
        let low_water = *self.capacity - (*self.capacity / EVICTION_BATCH_DIVISOR).max(1);
        let excess = self.entries.len().saturating_sub(low_water);
        if excess == 0 {
            return;
        }

        let mut candidates: Vec<(u64, String)> = self
            .entries
            .iter()
            .map(|entry| (*entry.value(), entry.key().clone()))
            .collect();

        if excess < candidates.len() {
            candidates.select_nth_unstable(excess);
            candidates.truncate(excess);
        }

        for (_, victim) in candidates {
            if self.entries.remove(&victim).is_some() {
                self.counters.evacuate.fetch_add(1, Ordering::Relaxed);
            }
        }
    } // end method make_room
}

impl LocalCache for TtlLocalCache {
    fn get(&self, key: &str) -> Option<u64> {
        let now = self.time_source.unix_now();

        let expires_at = self.entries.get(key).map(|entry| *entry.value());

        match expires_at {
            Some(expires_at) if expires_at > now => {
                self.counters.hit.fetch_add(1, Ordering::Relaxed);
                Some(expires_at)
            }
            Some(_) => {
                self.entries.remove_if(key, |_, expires_at| *expires_at <= now);
                self.counters.expired.fetch_add(1, Ordering::Relaxed);
                self.counters.miss.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.counters.miss.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    fn set(&self, key: &str, ttl_seconds: u64) {
        let now = self.time_source.unix_now();
        let expires_at = now.saturating_add(ttl_seconds);

        if let Some(mut existing) = self.entries.get_mut(key) {
            *existing = expires_at;
            self.counters.overwrite.fetch_add(1, Ordering::Relaxed);
            return;
        }

        self.make_room(now);
        self.entries.insert(key.to_string(), expires_at);
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn stats(&self) -> LocalCacheStats {
        let hit_count = self.counters.hit.load(Ordering::Relaxed);
        let miss_count = self.counters.miss.load(Ordering::Relaxed);

        LocalCacheStats {
            hit_count,
            miss_count,
            lookup_count: hit_count + miss_count,
            expired_count: self.counters.expired.load(Ordering::Relaxed),
            entry_count: self.entries.len() as u64,
            overwrite_count: self.counters.overwrite.load(Ordering::Relaxed),
            evacuate_count: self.counters.evacuate.load(Ordering::Relaxed),
        }
    }
}
