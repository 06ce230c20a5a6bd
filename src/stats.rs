use std::sync::atomic::{AtomicU64, Ordering};

/// Per-rule hit counters.
///
/// Owned by a single rule and shared with the engine through an `Arc`. Counters are
/// only ever added to, so concurrent calls never lose updates.
#[derive(Debug, Default)]
pub struct RateLimitStats {
    key: String,
    total_hits: AtomicU64,
    within_limit: AtomicU64,
    near_limit: AtomicU64,
    over_limit: AtomicU64,
    over_limit_with_local_cache: AtomicU64,
    shadow_mode: AtomicU64,
}

impl RateLimitStats {
    /// Create a zeroed counter set identified by `key` (e.g. `"key_value"`).
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    /// Identifier these counters are reported under.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Every hit checked against the rule.
    pub fn total_hits(&self) -> u64 {
        self.total_hits.load(Ordering::Relaxed)
    }

    /// Hits admitted.
    pub fn within_limit(&self) -> u64 {
        self.within_limit.load(Ordering::Relaxed)
    }

    /// Hits that landed between the near limit threshold and the limit.
    pub fn near_limit(&self) -> u64 {
        self.near_limit.load(Ordering::Relaxed)
    }

    /// Hits beyond the limit.
    pub fn over_limit(&self) -> u64 {
        self.over_limit.load(Ordering::Relaxed)
    }

    /// Over limit hits answered from the local cache.
    pub fn over_limit_with_local_cache(&self) -> u64 {
        self.over_limit_with_local_cache.load(Ordering::Relaxed)
    }

    /// Over limit hits let through because the rule runs in shadow mode.
    pub fn shadow_mode(&self) -> u64 {
        self.shadow_mode.load(Ordering::Relaxed)
    }

    pub(crate) fn add_total_hits(&self, n: u64) {
        self.total_hits.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn add_within_limit(&self, n: u64) {
        self.within_limit.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn add_near_limit(&self, n: u64) {
        self.near_limit.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn add_over_limit(&self, n: u64) {
        self.over_limit.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn add_over_limit_with_local_cache(&self, n: u64) {
        self.over_limit_with_local_cache.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn add_shadow_mode(&self, n: u64) {
        self.shadow_mode.fetch_add(n, Ordering::Relaxed);
    }
}

/// Point in time counters of a [`LocalCache`](crate::LocalCache).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocalCacheStats {
    /// Lookups that found a live entry.
    pub hit_count: u64,
    /// Lookups that found nothing or an expired entry.
    pub miss_count: u64,
    /// All lookups.
    pub lookup_count: u64,
    /// Entries found expired on lookup.
    pub expired_count: u64,
    /// Entries currently held, expired or not.
    pub entry_count: u64,
    /// Writes that replaced an existing entry.
    pub overwrite_count: u64,
    /// Live entries evicted to make room.
    pub evacuate_count: u64,
}
