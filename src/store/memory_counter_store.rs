use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use async_trait::async_trait;
use dashmap::{DashMap, mapref::entry::Entry};

use crate::{CounterStore, StoreError, TimeSource};

// Minimum seconds between sweeps triggered by create_if_absent.
const PURGE_INTERVAL_SECONDS: u64 = 1;

#[derive(Debug, Clone, Copy)]
struct MemoryCounter {
    value: u64,
    expires_at: u64,
}

impl MemoryCounter {
    fn is_live(&self, now: u64) -> bool {
        now < self.expires_at
    }
}

/// In-process [`CounterStore`].
///
/// Follows the strict contract: incrementing an absent or expired key fails with
/// [`StoreError::NotFound`].
///
/// # Memory
///
/// - Expired counters are dropped lazily when their key is accessed
/// - `create_if_absent` sweeps all expired counters, at most once per second
/// - [`purge_expired`](Self::purge_expired) and [`flush`](CounterStore::flush) sweep
///   on demand
///
/// The map therefore holds the live windows plus at most one second of expired ones.
///
/// State is not shared across processes.
pub struct MemoryCounterStore {
    counters: DashMap<String, MemoryCounter>,
    time_source: Arc<dyn TimeSource>,
    last_purge: AtomicU64,
}

impl MemoryCounterStore {
    /// Create an empty store reading expiry time from `time_source`.
    pub fn new(time_source: Arc<dyn TimeSource>) -> Self {
        Self {
            counters: DashMap::new(),
            time_source,
            last_purge: AtomicU64::new(0),
        }
    }

    /// Number of counters held, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    /// Whether the store holds no counters.
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    /// Drop every expired counter.
    pub fn purge_expired(&self) {
        let now = self.time_source.unix_now();
        self.last_purge.store(now, Ordering::Relaxed);
        self.counters.retain(|_, counter| counter.is_live(now));
    } // end method purge_expired

    fn maybe_purge_expired(&self, now: u64) {
        let last_purge = self.last_purge.load(Ordering::Relaxed);
        if now.saturating_sub(last_purge) < PURGE_INTERVAL_SECONDS {
            return;
        }

        // one sweeper per interval
        if self
            .last_purge
            .compare_exchange(last_purge, now, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
        {
            self.counters.retain(|_, counter| counter.is_live(now));
        }
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn batch_get(&self, keys: &[String]) -> Result<HashMap<String, u64>, StoreError> {
        let now = self.time_source.unix_now();

        let values = keys
            .iter()
            .filter_map(|key| {
                let counter = self.counters.get(key)?;
                counter
                    .is_live(now)
                    .then(|| (key.clone(), counter.value))
            })
            .collect();

        Ok(values)
    }

    async fn increment(&self, key: &str, by: u64) -> Result<u64, StoreError> {
        let now = self.time_source.unix_now();

        let Some(mut counter) = self.counters.get_mut(key) else {
            return Err(StoreError::NotFound);
        };

        if !counter.is_live(now) {
            drop(counter);
            self.counters.remove_if(key, |_, counter| !counter.is_live(now));
            return Err(StoreError::NotFound);
        }

        counter.value = counter.value.saturating_add(by);
        Ok(counter.value)
    }

    async fn create_if_absent(
        &self,
        key: &str,
        initial: u64,
        ttl_seconds: u64,
    ) -> Result<(), StoreError> {
        let now = self.time_source.unix_now();
        // must run before taking the entry lock below
        self.maybe_purge_expired(now);

        let fresh = MemoryCounter {
            value: initial,
            expires_at: now.saturating_add(ttl_seconds),
        };

        match self.counters.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_live(now) {
                    return Err(StoreError::AlreadyExists);
                }
                occupied.insert(fresh);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(fresh);
            }
        }

        Ok(())
    }

    async fn flush(&self) -> Result<(), StoreError> {
        self.purge_expired();
        Ok(())
    }
}
