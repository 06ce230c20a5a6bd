#![doc = include_str!("../README.md")]
#![deny(missing_docs)]
#![forbid(unsafe_code)]

mod rate_limit_cache;
pub use rate_limit_cache::*;

mod accountant;
pub use accountant::*;

mod rate_limit;
pub use rate_limit::*;

pub mod store;
pub use store::*;

mod local_cache;
pub use local_cache::*;

mod key;
pub use key::*;

pub mod window;

mod time;
pub use time::*;

mod stats;
pub use stats::*;

mod error;
pub use error::*;

mod common;
pub use common::{
    CacheKeyPrefix, Code, Descriptor, DescriptorEntry, DescriptorStatus, JitterMaxSeconds,
    Limit, LocalCacheCapacity, NearLimitRatio, RateLimitRequest, Unit,
};

#[cfg(test)]
mod tests;
