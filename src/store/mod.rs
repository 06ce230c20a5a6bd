//! Shared counter store interface and adapters.
//!
//! The engine works against the weakest common contract: `increment` may fail with
//! [`StoreError::NotFound`] for absent keys, in which case the caller initializes the
//! key with [`CounterStore::create_if_absent`]. Backends that can initialize on
//! increment simply never return `NotFound`.
//!
//! # Adapters
//!
//! - [`MemoryCounterStore`]: in-process, for single instance deployments and tests
//! - [`RedisCounterStore`]: Redis, behind the `redis-tokio` feature

use std::collections::HashMap;

use async_trait::async_trait;

use crate::StoreError;

mod memory_counter_store;
pub use memory_counter_store::*;

#[cfg(feature = "redis-tokio")]
mod redis_counter_store;
#[cfg(feature = "redis-tokio")]
pub use redis_counter_store::*;

/// A shared, TTL-capable store of integer counters.
///
/// Implementations must make `increment` and `create_if_absent` atomic per key. The
/// engine performs no client side locking.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Read the current value of each key. Absent keys are left out of the result.
    async fn batch_get(&self, keys: &[String]) -> Result<HashMap<String, u64>, StoreError>;

    /// Atomically add `by` to an existing counter and return the new value.
    ///
    /// Returns [`StoreError::NotFound`] if the key does not exist and the backend
    /// cannot initialize it.
    async fn increment(&self, key: &str, by: u64) -> Result<u64, StoreError>;

    /// Create `key` with `initial` and a TTL of `ttl_seconds` unless it already exists.
    ///
    /// Returns [`StoreError::AlreadyExists`] if another writer created it first.
    async fn create_if_absent(
        &self,
        key: &str,
        initial: u64,
        ttl_seconds: u64,
    ) -> Result<(), StoreError>;

    /// Push buffered state and release resources. Called on drain and shutdown.
    async fn flush(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
