use std::sync::Arc;

use super::support::FixedTimeSource;

use crate::{LocalCache, LocalCacheCapacity, TtlLocalCache};

fn local_cache(capacity: usize, time_source: &Arc<FixedTimeSource>) -> TtlLocalCache {
    TtlLocalCache::new(
        LocalCacheCapacity::try_from(capacity).unwrap(),
        time_source.clone(),
    )
}

#[test]
fn entry_is_live_until_its_ttl_elapses() {
    let time_source = FixedTimeSource::at(100);
    let cache = local_cache(10, &time_source);

    cache.set("k", 5);
    assert_eq!(cache.get("k"), Some(105));

    time_source.set(104);
    assert_eq!(cache.get("k"), Some(105));

    time_source.set(105);
    assert_eq!(cache.get("k"), None);
    assert!(cache.is_empty());

    let stats = cache.stats();
    assert_eq!(stats.hit_count, 2);
    assert_eq!(stats.miss_count, 1);
    assert_eq!(stats.lookup_count, 3);
    assert_eq!(stats.expired_count, 1);
    assert_eq!(stats.entry_count, 0);
}

#[test]
fn set_on_existing_key_overwrites() {
    let time_source = FixedTimeSource::at(100);
    let cache = local_cache(10, &time_source);

    cache.set("k", 5);
    cache.set("k", 50);

    assert_eq!(cache.get("k"), Some(150));
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.stats().overwrite_count, 1);
}

#[test]
fn full_cache_drops_expired_entries_first() {
    let time_source = FixedTimeSource::at(100);
    let cache = local_cache(2, &time_source);

    cache.set("short", 1);
    cache.set("long", 100);

    time_source.advance(1);
    cache.set("new", 10);

    assert_eq!(cache.len(), 2);
    assert!(cache.get("long").is_some());
    assert!(cache.get("new").is_some());
    assert_eq!(cache.stats().evacuate_count, 0);
}

#[test]
fn full_cache_evicts_entry_closest_to_expiry() {
    let time_source = FixedTimeSource::at(100);
    let cache = local_cache(2, &time_source);

    cache.set("a", 30);
    cache.set("b", 10);
    cache.set("c", 20);

    assert_eq!(cache.len(), 2);
    assert!(cache.get("b").is_none());
    assert!(cache.get("a").is_some());
    assert!(cache.get("c").is_some());
    assert_eq!(cache.stats().evacuate_count, 1);
}

#[test]
fn full_cache_evicts_a_batch_then_inserts_without_sweeping() {
    let time_source = FixedTimeSource::at(100);
    let cache = local_cache(100, &time_source);

    // key_i expires at 100 + 1000 + i
    for i in 0..100 {
        cache.set(&format!("key_{i}"), 1_000 + i);
    }
    assert_eq!(cache.len(), 100);

    cache.set("first_overflow", 5_000);
    assert_eq!(cache.len(), 91);
    assert_eq!(cache.stats().evacuate_count, 10);
    for i in 0..10 {
        assert!(cache.get(&format!("key_{i}")).is_none(), "key_{i} should be evicted");
    }
    assert!(cache.get("key_10").is_some());

    for i in 0..9 {
        cache.set(&format!("later_{i}"), 5_000);
    }
    assert_eq!(cache.len(), 100);
    assert_eq!(cache.stats().evacuate_count, 10);

    cache.set("second_overflow", 5_000);
    assert_eq!(cache.len(), 91);
    assert_eq!(cache.stats().evacuate_count, 20);
}
