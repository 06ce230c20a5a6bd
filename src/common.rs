use std::{
    ops::{Deref, DerefMut},
    sync::Arc,
    time::Duration,
};

use crate::LimitCacheError;

/// Length of a fixed rate limit window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unit {
    /// One second.
    Second,
    /// Sixty seconds.
    Minute,
    /// 3600 seconds.
    Hour,
    /// 86400 seconds.
    Day,
    /// Seven days.
    Week,
    /// Thirty days.
    Month,
    /// 365 days.
    Year,
}

impl Unit {
    /// Number of seconds in one window of this unit.
    pub fn seconds(&self) -> u64 {
        match self {
            Unit::Second => 1,
            Unit::Minute => 60,
            Unit::Hour => 3_600,
            Unit::Day => 86_400,
            Unit::Week => 604_800,
            Unit::Month => 2_592_000,
            Unit::Year => 31_536_000,
        }
    }
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Unit::Second => "SECOND",
            Unit::Minute => "MINUTE",
            Unit::Hour => "HOUR",
            Unit::Day => "DAY",
            Unit::Week => "WEEK",
            Unit::Month => "MONTH",
            Unit::Year => "YEAR",
        };

        f.write_str(name)
    }
}

/// A threshold: at most `requests_per_unit` hits per `unit` window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Limit {
    /// Hits allowed per window.
    pub requests_per_unit: u32,
    /// Window length.
    pub unit: Unit,
}

/// A single `(key, value)` label of a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DescriptorEntry {
    /// Label name.
    pub key: String,
    /// Label value.
    pub value: String,
}

impl DescriptorEntry {
    /// Create a new entry.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// One independently rate limited dimension of a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Descriptor {
    /// Ordered labels identifying the traffic dimension.
    pub entries: Vec<DescriptorEntry>,
    /// Hits to apply for this descriptor. Overrides the request level addend.
    pub hits_addend: Option<u64>,
}

impl Descriptor {
    /// Build a descriptor from `(key, value)` pairs.
    pub fn new<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(key, value)| DescriptorEntry::new(key, value))
                .collect(),
            hits_addend: None,
        }
    }

    /// Set a per-descriptor hits addend.
    pub fn with_hits_addend(mut self, hits_addend: u64) -> Self {
        self.hits_addend = Some(hits_addend);
        self
    }
}

/// A request as received from the front end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitRequest {
    /// Rate limit domain, the first component of every window key.
    pub domain: String,
    /// Descriptors, each checked against the rule at the same position.
    pub descriptors: Vec<Descriptor>,
    /// Default hits for descriptors without their own addend. `0` is treated as `1`.
    pub hits_addend: u64,
}

impl RateLimitRequest {
    /// Create a request applying one hit per descriptor.
    pub fn new(domain: impl Into<String>, descriptors: Vec<Descriptor>) -> Self {
        Self {
            domain: domain.into(),
            descriptors,
            hits_addend: 1,
        }
    }

    /// Set the request level hits addend.
    pub fn with_hits_addend(mut self, hits_addend: u64) -> Self {
        self.hits_addend = hits_addend;
        self
    }

    /// Hits to apply for the descriptor at `index`.
    pub fn hits_for(&self, index: usize) -> u64 {
        self.descriptors
            .get(index)
            .and_then(|descriptor| descriptor.hits_addend)
            .unwrap_or(self.hits_addend.max(1))
    }
}

/// Outcome code for one descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Code {
    /// The hit is admitted.
    Ok,
    /// The rule's threshold is exceeded in the current window.
    OverLimit,
}

/// The decision for one descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorStatus {
    /// Allow or deny.
    pub code: Code,
    /// Echo of the applied threshold. `None` when no rule applied.
    pub current_limit: Option<Limit>,
    /// Hits left in the current window.
    pub limit_remaining: u32,
    /// Time until the current window ends. `None` when no rule applied.
    pub duration_until_reset: Option<Duration>,
}

impl DescriptorStatus {
    /// Status for a descriptor that has no rule configured.
    pub fn no_limit() -> Self {
        Self {
            code: Code::Ok,
            current_limit: None,
            limit_remaining: 0,
            duration_until_reset: None,
        }
    }

    /// Status for a descriptor whose rule is marked unlimited.
    pub fn unlimited() -> Self {
        Self {
            code: Code::Ok,
            current_limit: None,
            limit_remaining: u32::MAX,
            duration_until_reset: None,
        }
    }
}

const RATIO_SCALE: u64 = 1_000_000;

/// Fraction of a limit at which hits start counting as "near limit".
///
/// Stored as parts per million so threshold arithmetic is exact for ratios such as
/// `0.8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NearLimitRatio(u64);

impl NearLimitRatio {
    /// The ratio as a float.
    pub fn as_f64(&self) -> f64 {
        self.0 as f64 / RATIO_SCALE as f64
    }

    /// `floor(limit * (1 - ratio))`, computed without rounding error.
    pub(crate) fn headroom(&self, limit: u64) -> u64 {
        let complement = RATIO_SCALE - self.0;
        ((limit as u128 * complement as u128) / RATIO_SCALE as u128) as u64
    }
}

impl Default for NearLimitRatio {
    /// Returns a ratio of 0.8.
    fn default() -> Self {
        Self(800_000)
    }
}

impl TryFrom<f64> for NearLimitRatio {
    type Error = LimitCacheError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if !value.is_finite() || value <= 0.0 || value > 1.0 {
            return Err(LimitCacheError::InvalidNearLimitRatio(
                "Near limit ratio must be in (0, 1]".to_string(),
            ));
        }

        let parts = (value * RATIO_SCALE as f64).round() as u64;
        if parts == 0 {
            return Err(LimitCacheError::InvalidNearLimitRatio(
                "Near limit ratio is too small".to_string(),
            ));
        }

        Ok(Self(parts.min(RATIO_SCALE)))
    }
}

/// Upper bound of the random TTL extension added to newly created counters.
///
/// `0` disables jitter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct JitterMaxSeconds(u64);

impl Deref for JitterMaxSeconds {
    type Target = u64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for JitterMaxSeconds {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<u64> for JitterMaxSeconds {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Maximum number of entries held by the local over-limit cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LocalCacheCapacity(usize);

impl Default for LocalCacheCapacity {
    /// Returns a capacity of 10 000 entries.
    fn default() -> Self {
        Self(10_000)
    }
}

impl Deref for LocalCacheCapacity {
    type Target = usize;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl TryFrom<usize> for LocalCacheCapacity {
    type Error = LimitCacheError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        if value == 0 {
            Err(LimitCacheError::InvalidLocalCacheCapacity(
                "Local cache capacity must be greater than 0".to_string(),
            ))
        } else {
            Ok(Self(value))
        }
    }
}

/// Namespace prepended to every window key.
///
/// May be empty. Must not contain whitespace or control characters, which common
/// counter stores reject in keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CacheKeyPrefix(Arc<str>);

impl Deref for CacheKeyPrefix {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl TryFrom<String> for CacheKeyPrefix {
    type Error = LimitCacheError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.len() > 128 {
            Err(LimitCacheError::InvalidCacheKeyPrefix(
                "Cache key prefix must not be longer than 128 characters".to_string(),
            ))
        } else if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
            Err(LimitCacheError::InvalidCacheKeyPrefix(
                "Cache key prefix must not contain whitespace or control characters"
                    .to_string(),
            ))
        } else {
            Ok(Self(Arc::from(value)))
        }
    }
}

impl TryFrom<&str> for CacheKeyPrefix {
    type Error = LimitCacheError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::try_from(value.to_string())
    }
}
