/// Error returned by [`CounterStore`](crate::CounterStore) implementations.
///
/// `NotFound` and `AlreadyExists` are expected signals of the create-on-miss protocol,
/// not failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Increment was attempted on a key that does not exist.
    #[error("key not found")]
    NotFound,
    /// Create-if-absent was attempted on a key that already exists.
    #[error("key already exists")]
    AlreadyExists,
    /// Redis error.
    #[cfg(feature = "redis-tokio")]
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    /// Any other backend failure.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Error type for this crate.
#[derive(Debug, thiserror::Error)]
pub enum LimitCacheError {
    /// A counter store call failed for `key`.
    #[error("counter store error for key {key}: {source}")]
    Store {
        /// Window key being resolved.
        key: String,
        /// Underlying store error.
        #[source]
        source: StoreError,
    },
    /// The increment retried after losing a create race still found no key.
    #[error("increment retry after lost create race failed for key {key}")]
    RaceRecoveryFailed {
        /// Window key being resolved.
        key: String,
    },
    /// Flushing the counter store failed.
    #[error("counter store flush failed: {0}")]
    Flush(#[source] StoreError),
    /// The rule list is not aligned with the descriptor list.
    #[error("request has {descriptors} descriptors but {limits} limits were supplied")]
    DescriptorLimitMismatch {
        /// Number of descriptors in the request.
        descriptors: usize,
        /// Number of rule slots supplied.
        limits: usize,
    },
    /// Invalid near limit ratio.
    #[error("invalid near limit ratio: {0}")]
    InvalidNearLimitRatio(String),
    /// Invalid local cache capacity.
    #[error("invalid local cache capacity: {0}")]
    InvalidLocalCacheCapacity(String),
    /// Invalid cache key prefix.
    #[error("invalid cache key prefix: {0}")]
    InvalidCacheKeyPrefix(String),
    /// Redis error raised while building a store.
    #[cfg(feature = "redis-tokio")]
    #[error("redis error: {0}")]
    RedisError(#[from] redis::RedisError),
}
