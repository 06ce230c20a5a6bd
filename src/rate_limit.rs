use std::sync::Arc;

use crate::{Limit, RateLimitStats, Unit};

/// A configured rule applied to one descriptor.
///
/// Rules are resolved by the caller (configuration lookup is not part of this crate)
/// and passed to [`RateLimitCache::do_limit`](crate::RateLimitCache::do_limit) aligned
/// with the request's descriptors.
#[derive(Debug, Clone)]
pub struct RateLimit {
    /// Threshold and window.
    pub limit: Limit,
    /// Counters updated by every decision made under this rule.
    pub stats: Arc<RateLimitStats>,
    /// Skip limiting entirely. The counter store is never consulted.
    pub unlimited: bool,
    /// Account normally but always answer [`Code::Ok`](crate::Code::Ok).
    pub shadow_mode: bool,
    /// Optional human readable rule name.
    pub name: Option<String>,
}

impl RateLimit {
    /// Create a rule allowing `requests_per_unit` hits per `unit`.
    pub fn new(requests_per_unit: u32, unit: Unit, stats: Arc<RateLimitStats>) -> Self {
        Self {
            limit: Limit {
                requests_per_unit,
                unit,
            },
            stats,
            unlimited: false,
            shadow_mode: false,
            name: None,
        }
    }

    /// Mark the rule unlimited.
    pub fn with_unlimited(mut self) -> Self {
        self.unlimited = true;
        self
    }

    /// Run the rule in shadow mode.
    pub fn with_shadow_mode(mut self) -> Self {
        self.shadow_mode = true;
        self
    }

    /// Name the rule.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}
