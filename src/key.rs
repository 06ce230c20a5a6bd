use std::fmt::Write;

use crate::{CacheKeyPrefix, Descriptor, Limit, window};

/// Builds window keys of the form `<prefix><domain>_<k>_<v>_..._<bucket_start>`.
#[derive(Clone, Debug, Default)]
pub struct CacheKeyGenerator {
    prefix: CacheKeyPrefix,
}

impl CacheKeyGenerator {
    /// Create a generator that prepends `prefix` to every key.
    pub fn new(prefix: CacheKeyPrefix) -> Self {
        Self { prefix }
    }

    /// Key for `descriptor` under `limit` in the window containing `now`.
    pub fn generate(&self, domain: &str, descriptor: &Descriptor, limit: &Limit, now: u64) -> String {
        let entries_len: usize = descriptor
            .entries
            .iter()
            .map(|entry| entry.key.len() + entry.value.len() + 2)
            .sum();

        let mut key = String::with_capacity(self.prefix.len() + domain.len() + entries_len + 21);
        key.push_str(&self.prefix);
        key.push_str(domain);
        key.push('_');

        for entry in &descriptor.entries {
            key.push_str(&entry.key);
            key.push('_');
            key.push_str(&entry.value);
            key.push('_');
        }

        // writing into a String cannot fail
        let _ = write!(key, "{}", window::bucket_start(now, limit.unit));

        key
    } // end method generate
}
