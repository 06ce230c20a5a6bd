use std::{
    collections::{HashMap, VecDeque},
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
};

use async_trait::async_trait;

use crate::{
    CounterStore, JitterSource, RateLimit, RateLimitStats, StoreError, TimeSource, Unit,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum StoreCall {
    BatchGet(Vec<String>),
    Increment(String, u64),
    CreateIfAbsent(String, u64, u64),
    Flush,
}

/// Counter store answering from scripted queues and recording every call.
///
/// An unscripted `batch_get` answers with an empty map; unscripted `increment` or
/// `create_if_absent` calls panic.
#[derive(Default)]
pub(super) struct MockCounterStore {
    calls: Mutex<Vec<StoreCall>>,
    batch_get: Mutex<VecDeque<Result<HashMap<String, u64>, StoreError>>>,
    increment: Mutex<VecDeque<Result<u64, StoreError>>>,
    create: Mutex<VecDeque<Result<(), StoreError>>>,
    flush: Mutex<VecDeque<Result<(), StoreError>>>,
}

impl MockCounterStore {
    pub(super) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(super) fn on_batch_get(&self, values: &[(&str, u64)]) {
        let values = values
            .iter()
            .map(|(key, value)| (key.to_string(), *value))
            .collect();
        self.batch_get.lock().unwrap().push_back(Ok(values));
    }

    pub(super) fn on_batch_get_err(&self, err: StoreError) {
        self.batch_get.lock().unwrap().push_back(Err(err));
    }

    pub(super) fn on_increment(&self, result: Result<u64, StoreError>) {
        self.increment.lock().unwrap().push_back(result);
    }

    pub(super) fn on_create(&self, result: Result<(), StoreError>) {
        self.create.lock().unwrap().push_back(result);
    }

    pub(super) fn on_flush(&self, result: Result<(), StoreError>) {
        self.flush.lock().unwrap().push_back(result);
    }

    /// Drain the recorded calls.
    pub(super) fn take_calls(&self) -> Vec<StoreCall> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }

    fn record(&self, call: StoreCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl CounterStore for MockCounterStore {
    async fn batch_get(&self, keys: &[String]) -> Result<HashMap<String, u64>, StoreError> {
        self.record(StoreCall::BatchGet(keys.to_vec()));

        self.batch_get
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(HashMap::new()))
    }

    async fn increment(&self, key: &str, by: u64) -> Result<u64, StoreError> {
        self.record(StoreCall::Increment(key.to_string(), by));

        self.increment
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected increment of {key} by {by}"))
    }

    async fn create_if_absent(
        &self,
        key: &str,
        initial: u64,
        ttl_seconds: u64,
    ) -> Result<(), StoreError> {
        self.record(StoreCall::CreateIfAbsent(
            key.to_string(),
            initial,
            ttl_seconds,
        ));

        self.create
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected create of {key}"))
    }

    async fn flush(&self) -> Result<(), StoreError> {
        self.record(StoreCall::Flush);

        self.flush.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }
}

#[derive(Debug, Default)]
pub(super) struct FixedTimeSource(AtomicU64);

impl FixedTimeSource {
    pub(super) fn at(now: u64) -> Arc<Self> {
        Arc::new(Self(AtomicU64::new(now)))
    }

    pub(super) fn set(&self, now: u64) {
        self.0.store(now, Ordering::SeqCst);
    }

    pub(super) fn advance(&self, seconds: u64) {
        self.0.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl TimeSource for FixedTimeSource {
    fn unix_now(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Jitter source returning a fixed value and remembering the bounds it was asked for.
#[derive(Debug, Default)]
pub(super) struct FixedJitterSource {
    value: u64,
    requested_max: Mutex<Vec<u64>>,
}

impl FixedJitterSource {
    pub(super) fn new(value: u64) -> Arc<Self> {
        Arc::new(Self {
            value,
            requested_max: Mutex::new(Vec::new()),
        })
    }

    pub(super) fn requested_max(&self) -> Vec<u64> {
        self.requested_max.lock().unwrap().clone()
    }
}

impl JitterSource for FixedJitterSource {
    fn next_in_range(&self, max: u64) -> u64 {
        self.requested_max.lock().unwrap().push(max);
        self.value.min(max)
    }
}

pub(super) fn rate_limit(requests_per_unit: u32, unit: Unit, key: &str) -> RateLimit {
    RateLimit::new(requests_per_unit, unit, Arc::new(RateLimitStats::new(key)))
}

/// `(total, within, near, over)` of a rule's counters.
pub(super) fn counts(rate_limit: &RateLimit) -> (u64, u64, u64, u64) {
    (
        rate_limit.stats.total_hits(),
        rate_limit.stats.within_limit(),
        rate_limit.stats.near_limit(),
        rate_limit.stats.over_limit(),
    )
}
