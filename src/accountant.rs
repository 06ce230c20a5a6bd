use crate::{Code, NearLimitRatio, RateLimitStats};

/// Classification of one `(rule, hits)` pair plus the statistics it contributes.
///
/// Near and over deltas count disjoint slices of the boundary crossing; they are not a
/// partition of `hits`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accounting {
    /// Allow or deny.
    pub code: Code,
    /// Hits left in the window after this call.
    pub remaining: u64,
    /// Hits applied by this call.
    pub hits: u64,
    /// Credited to `within_limit`.
    pub within_delta: u64,
    /// Credited to `near_limit`.
    pub near_delta: u64,
    /// Credited to `over_limit`.
    pub over_delta: u64,
    /// Whether the answer came from the local cache.
    pub from_local_cache: bool,
}

impl Accounting {
    /// Add this outcome to `stats`.
    pub fn apply(&self, stats: &RateLimitStats) {
        stats.add_total_hits(self.hits);

        if self.within_delta > 0 {
            stats.add_within_limit(self.within_delta);
        }
        if self.near_delta > 0 {
            stats.add_near_limit(self.near_delta);
        }
        if self.over_delta > 0 {
            stats.add_over_limit(self.over_delta);
        }
        if self.from_local_cache {
            stats.add_over_limit_with_local_cache(self.over_delta);
        }
    }
}

/// Near limit / over limit accounting for fixed window counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct LimitAccountant {
    near_limit_ratio: NearLimitRatio,
}

impl LimitAccountant {
    /// Create an accountant applying `near_limit_ratio` to every rule.
    pub fn new(near_limit_ratio: NearLimitRatio) -> Self {
        Self { near_limit_ratio }
    }

    /// First counter value considered near the limit:
    /// `limit - floor(limit * (1 - ratio))`.
    pub fn near_threshold(&self, limit: u64) -> u64 {
        limit - self.near_limit_ratio.headroom(limit)
    }

    /// Classify a call that moved the counter from `before` to `after` by `hits`.
    ///
    /// `after` is authoritative. `before` is a best effort read and may be `0` when
    /// unknown.
    pub fn classify(&self, limit: u64, before: u64, after: u64, hits: u64) -> Accounting {
        let near_threshold = self.near_threshold(limit);

        if after > limit {
            let (over_delta, near_delta) = if before >= limit {
                (hits, 0)
            } else if before < near_threshold {
                (after - limit, limit - near_threshold)
            } else {
                (after - limit, limit - before)
            };

            return Accounting {
                code: Code::OverLimit,
                remaining: 0,
                hits,
                within_delta: 0,
                near_delta,
                over_delta,
                from_local_cache: false,
            };
        }

        let near_delta = if after < near_threshold {
            0
        } else if before >= near_threshold {
            hits
        } else {
            (after - near_threshold).saturating_add(1)
        };

        Accounting {
            code: Code::Ok,
            remaining: limit - after,
            hits,
            within_delta: hits,
            near_delta,
            over_delta: 0,
            from_local_cache: false,
        }
    } // end method classify

    /// Outcome for a key the local cache already knows to be over limit.
    pub fn short_circuit(&self, hits: u64) -> Accounting {
        Accounting {
            code: Code::OverLimit,
            remaining: 0,
            hits,
            within_delta: 0,
            near_delta: 0,
            over_delta: hits,
            from_local_cache: true,
        }
    }
}
