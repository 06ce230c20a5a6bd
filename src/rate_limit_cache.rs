use std::{collections::HashMap, sync::Arc, time::Duration};

use futures::future::try_join_all;

use crate::{
    Accounting, CacheKeyGenerator, CacheKeyPrefix, Code, CounterStore, DescriptorStatus,
    JitterMaxSeconds, JitterSource, LimitAccountant, LimitCacheError, LocalCache,
    LocalCacheStats, NearLimitRatio, RandJitterSource, RateLimit, RateLimitRequest, StoreError,
    TimeSource, window,
};

/// Configuration for [`RateLimitCache`].
///
/// All values arrive already validated; parsing them from files or the environment is
/// the caller's concern.
#[derive(Clone, Debug, Default)]
pub struct RateLimitCacheOptions {
    /// Fraction of each limit at which hits start counting as near limit.
    pub near_limit_ratio: NearLimitRatio,
    /// Namespace prepended to every window key.
    pub cache_key_prefix: CacheKeyPrefix,
    /// Upper bound of the random TTL extension for newly created counters.
    ///
    /// Spreads the expiry of keys created in the same second so they are not all
    /// recreated at once.
    pub expiration_jitter_max_seconds: JitterMaxSeconds,
}

/// A rule slot that needs a counter store decision.
struct PendingLimit<'a> {
    index: usize,
    key: String,
    rate_limit: &'a RateLimit,
    hits: u64,
}

/// Fixed window rate limiter over a shared [`CounterStore`].
///
/// # Algorithm
///
/// For every `(descriptor, rule)` pair of a request:
///
/// 1. Build the window key `<prefix><domain>_<k>_<v>_..._<bucket_start>`
/// 2. If the [`LocalCache`] holds the key, answer over limit without touching the store
/// 3. Read the current values of the remaining keys in one batch (best effort)
/// 4. Increment each key, creating it on miss with TTL `time_until_reset + jitter`
/// 5. Classify with the [`LimitAccountant`] and update the rule's stats
/// 6. Remember newly over limit keys in the local cache until the window resets
///
/// # Consistency
///
/// - The value returned by the store's increment is the only input to allow/deny
/// - The batched pre-read and the local cache only shape near limit statistics and
///   skip store calls; they never override an increment result
/// - Concurrent callers may overshoot a limit by the hits they add in flight
///
/// # Examples
///
/// ```ignore
/// use std::sync::Arc;
/// use limitcache::{
///     Descriptor, MemoryCounterStore, RateLimit, RateLimitCache, RateLimitCacheOptions,
///     RateLimitRequest, RateLimitStats, SystemTimeSource, Unit,
/// };
///
/// let time_source = Arc::new(SystemTimeSource);
/// let store = Arc::new(MemoryCounterStore::new(time_source.clone()));
/// let cache = RateLimitCache::new(store, time_source, RateLimitCacheOptions::default());
///
/// let request = RateLimitRequest::new("edge", vec![Descriptor::new([("user", "alice")])]);
/// let limits = vec![Some(RateLimit::new(10, Unit::Second, Arc::new(RateLimitStats::new("user"))))];
///
/// let statuses = cache.do_limit(&request, &limits).await?;
/// ```
pub struct RateLimitCache {
    store: Arc<dyn CounterStore>,
    time_source: Arc<dyn TimeSource>,
    jitter_source: Arc<dyn JitterSource>,
    local_cache: Option<Arc<dyn LocalCache>>,
    expiration_jitter_max_seconds: JitterMaxSeconds,
    accountant: LimitAccountant,
    key_generator: CacheKeyGenerator,
}

impl RateLimitCache {
    /// Create a limiter over `store` without a local cache.
    pub fn new(
        store: Arc<dyn CounterStore>,
        time_source: Arc<dyn TimeSource>,
        options: RateLimitCacheOptions,
    ) -> Self {
        Self {
            store,
            time_source,
            jitter_source: Arc::new(RandJitterSource),
            local_cache: None,
            expiration_jitter_max_seconds: options.expiration_jitter_max_seconds,
            accountant: LimitAccountant::new(options.near_limit_ratio),
            key_generator: CacheKeyGenerator::new(options.cache_key_prefix),
        }
    } // end constructor

    /// Short-circuit keys known to be over limit through `local_cache`.
    pub fn with_local_cache(mut self, local_cache: Arc<dyn LocalCache>) -> Self {
        self.local_cache = Some(local_cache);
        self
    }

    /// Replace the default `rand` backed jitter source.
    pub fn with_jitter_source(mut self, jitter_source: Arc<dyn JitterSource>) -> Self {
        self.jitter_source = jitter_source;
        self
    }

    /// Counters of the local cache, if one is configured.
    pub fn local_cache_stats(&self) -> Option<LocalCacheStats> {
        self.local_cache.as_ref().map(|cache| cache.stats())
    }

    /// Decide every descriptor of `request` against the rule at the same position.
    ///
    /// `limits[i] == None` means no rule is configured for descriptor `i`; it is
    /// skipped and answered [`DescriptorStatus::no_limit`].
    ///
    /// # Errors
    ///
    /// - [`LimitCacheError::DescriptorLimitMismatch`] if the two lists differ in length
    /// - [`LimitCacheError::Store`] if an increment or create fails for a reason other
    ///   than the expected miss / race signals
    /// - [`LimitCacheError::RaceRecoveryFailed`] if the single increment retry after a
    ///   lost create race still finds no key
    ///
    /// A failed batched pre-read is not an error. Counters incremented before a
    /// failure stay incremented, but no rule's stats are updated for a failed call.
    pub async fn do_limit(
        &self,
        request: &RateLimitRequest,
        limits: &[Option<RateLimit>],
    ) -> Result<Vec<DescriptorStatus>, LimitCacheError> {
        if request.descriptors.len() != limits.len() {
            return Err(LimitCacheError::DescriptorLimitMismatch {
                descriptors: request.descriptors.len(),
                limits: limits.len(),
            });
        }

        let now = self.time_source.unix_now();

        let mut statuses = vec![DescriptorStatus::no_limit(); limits.len()];
        let mut short_circuited: Vec<(usize, &RateLimit, Accounting)> = Vec::new();
        let mut pending: Vec<PendingLimit<'_>> = Vec::with_capacity(limits.len());

        for (index, (descriptor, rate_limit)) in
            request.descriptors.iter().zip(limits).enumerate()
        {
            let Some(rate_limit) = rate_limit else {
                continue;
            };

            if rate_limit.unlimited {
                statuses[index] = DescriptorStatus::unlimited();
                continue;
            }

            let hits = request.hits_for(index);
            let key =
                self.key_generator
                    .generate(&request.domain, descriptor, &rate_limit.limit, now);

            if let Some(local_cache) = &self.local_cache
                && local_cache.get(&key).is_some()
            {
                tracing::debug!(key = %key, hits, "over limit via local cache");

                short_circuited.push((index, rate_limit, self.accountant.short_circuit(hits)));
                continue;
            }

            pending.push(PendingLimit {
                index,
                key,
                rate_limit,
                hits,
            });
        }

        let counts = self.increment_pending(&pending, now).await?;

        // Stats are only touched once every store call has succeeded.
        for (index, rate_limit, accounting) in short_circuited {
            statuses[index] = self.finish(rate_limit, accounting, now);
        }

        for (p, (before, after)) in pending.iter().zip(counts) {
            let limit = u64::from(p.rate_limit.limit.requests_per_unit);

            let accounting = self.accountant.classify(limit, before, after, p.hits);

            if accounting.code == Code::OverLimit
                && let Some(local_cache) = &self.local_cache
            {
                local_cache.set(&p.key, window::time_until_reset(now, p.rate_limit.limit.unit));
            }

            statuses[p.index] = self.finish(p.rate_limit, accounting, now);
        }

        Ok(statuses)
    } // end method do_limit

    /// `(before, after)` counter values for every pending pair, in order.
    ///
    /// Makes no store call when nothing is pending.
    async fn increment_pending(
        &self,
        pending: &[PendingLimit<'_>],
        now: u64,
    ) -> Result<Vec<(u64, u64)>, LimitCacheError> {
        if pending.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = pending.iter().map(|p| p.key.clone()).collect();
        let before_values = match self.store.batch_get(&keys).await {
            Ok(values) => values,
            Err(err) => {
                tracing::warn!(error = ?err, "counter store batch read failed, assuming empty counters");
                HashMap::new()
            }
        };

        let after_values = try_join_all(pending.iter().map(|p| {
            let ttl_seconds = window::time_until_reset(now, p.rate_limit.limit.unit);
            self.increment_or_create(&p.key, p.hits, ttl_seconds)
        }))
        .await?;

        Ok(pending
            .iter()
            .zip(after_values)
            .map(|(p, after)| (before_values.get(&p.key).copied().unwrap_or(0), after))
            .collect())
    } // end method increment_pending

    /// Push pending state to the counter store and release it.
    ///
    /// Decisions already returned are unaffected.
    pub async fn flush(&self) -> Result<(), LimitCacheError> {
        self.store.flush().await.map_err(|err| {
            tracing::error!(error = ?err, "failed to flush counter store");
            LimitCacheError::Flush(err)
        })
    }

    /// Apply `accounting` to the rule's stats and build its status.
    fn finish(&self, rate_limit: &RateLimit, accounting: Accounting, now: u64) -> DescriptorStatus {
        accounting.apply(&rate_limit.stats);

        let mut code = accounting.code;
        if rate_limit.shadow_mode && code == Code::OverLimit {
            tracing::debug!(
                rule = rate_limit.name.as_deref().unwrap_or(rate_limit.stats.key()),
                hits = accounting.hits,
                "over limit in shadow mode, allowing"
            );
            rate_limit.stats.add_shadow_mode(accounting.hits);
            code = Code::Ok;
        }

        DescriptorStatus {
            code,
            current_limit: Some(rate_limit.limit),
            limit_remaining: u32::try_from(accounting.remaining).unwrap_or(u32::MAX),
            duration_until_reset: Some(Duration::from_secs(window::time_until_reset(
                now,
                rate_limit.limit.unit,
            ))),
        }
    }

    /// Increment `key` by `hits`, creating it if the store reports it missing.
    ///
    /// Losing the create race to a concurrent writer falls back to exactly one more
    /// increment.
    async fn increment_or_create(
        &self,
        key: &str,
        hits: u64,
        ttl_seconds: u64,
    ) -> Result<u64, LimitCacheError> {
        match self.store.increment(key, hits).await {
            Ok(after) => return Ok(after),
            Err(StoreError::NotFound) => {}
            Err(source) => return Err(store_error(key, source)),
        }

        let jitter = match *self.expiration_jitter_max_seconds {
            0 => 0,
            max => self.jitter_source.next_in_range(max),
        };

        match self
            .store
            .create_if_absent(key, hits, ttl_seconds.saturating_add(jitter))
            .await
        {
            Ok(()) => return Ok(hits),
            Err(StoreError::AlreadyExists) => {
                tracing::debug!(key = %key, "lost counter create race, retrying increment");
            }
            Err(source) => return Err(store_error(key, source)),
        }

        match self.store.increment(key, hits).await {
            Ok(after) => Ok(after),
            Err(StoreError::NotFound) => {
                tracing::error!(key = %key, "counter missing after lost create race");
                Err(LimitCacheError::RaceRecoveryFailed {
                    key: key.to_string(),
                })
            }
            Err(source) => Err(store_error(key, source)),
        }
    } // end method increment_or_create
}

fn store_error(key: &str, source: StoreError) -> LimitCacheError {
    tracing::error!(key = %key, error = ?source, "counter store call failed");
    LimitCacheError::Store {
        key: key.to_string(),
        source,
    }
}
