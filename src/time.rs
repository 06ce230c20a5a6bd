use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;

/// Wall clock abstraction so window boundaries can be controlled in tests.
pub trait TimeSource: Send + Sync {
    /// Current time in unix seconds.
    fn unix_now(&self) -> u64;
}

/// [`TimeSource`] backed by [`SystemTime`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn unix_now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or(0)
    }
}

/// Source of expiration jitter.
pub trait JitterSource: Send + Sync {
    /// Uniformly distributed integer in `[0, max]`.
    fn next_in_range(&self, max: u64) -> u64;
}

/// [`JitterSource`] backed by the thread local `rand` generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandJitterSource;

impl JitterSource for RandJitterSource {
    fn next_in_range(&self, max: u64) -> u64 {
        if max == 0 {
            return 0;
        }

        rand::rng().random_range(0..=max)
    }
}
