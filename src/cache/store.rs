//! TTL-keyed response cache
//!
//! Provides a `TtlCache` that fronts any upstream call with a serde-generic
//! get-or-absent interface. Entries are evicted lazily on read, never swept
//! in the background; memory growth is bounded by the small, enumerable set
//! of cache keys the services issue.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

/// A single cached value with its expiry timestamp
struct CacheEntry {
    value: Value,
    expires_at: DateTime<Utc>,
}

/// In-memory key-value cache with per-entry expiry.
///
/// Values are stored as JSON so one cache can hold every data class the
/// services produce. Concurrent misses on the same key may both fetch and
/// both write; the overwrite is idempotent.
#[derive(Default)]
pub struct TtlCache {
    entries: DashMap<String, CacheEntry>,
}

impl TtlCache {
    /// Creates an empty cache
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Returns the cached value for `key` if it has not expired.
    ///
    /// An expired entry is removed on the spot and `None` is returned. A
    /// value that fails to decode as `T` also yields `None`; the cache never
    /// errors on a read.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        if let Some(entry) = self.entries.get(key) {
            if Utc::now() < entry.expires_at {
                return serde_json::from_value(entry.value.clone()).ok();
            }
            drop(entry);
            self.entries.remove(key);
        }
        None
    }

    /// Stores `value` under `key` with expiry `now + ttl_seconds`.
    ///
    /// A value that fails to serialize is dropped silently; callers treat the
    /// cache as best-effort.
    pub fn set<T: Serialize>(&self, key: &str, value: &T, ttl_seconds: u64) {
        let Ok(json) = serde_json::to_value(value) else {
            return;
        };
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value: json,
                expires_at: Utc::now() + Duration::seconds(ttl_seconds as i64),
            },
        );
    }

    /// Reports whether `key` holds an unexpired entry without decoding it
    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .map(|entry| Utc::now() < entry.expires_at)
            .unwrap_or(false)
    }

    /// Removes every entry unconditionally.
    ///
    /// Used whenever the identity behind cached data changes: a new bearer
    /// token invalidates all previously cached cloud data even if unexpired.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of entries currently held, including not-yet-evicted expired ones
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the cache holds no entries at all
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct TestData {
        name: String,
        value: i32,
    }

    fn sample() -> TestData {
        TestData {
            name: "test".to_string(),
            value: 42,
        }
    }

    #[test]
    fn test_set_then_get_returns_value() {
        let cache = TtlCache::new();
        cache.set("key", &sample(), 60);

        let got: Option<TestData> = cache.get("key");
        assert_eq!(got, Some(sample()));
    }

    #[test]
    fn test_get_missing_key_returns_none() {
        let cache = TtlCache::new();
        let got: Option<TestData> = cache.get("nope");
        assert!(got.is_none());
    }

    #[test]
    fn test_expired_entry_is_absent_and_evicted() {
        let cache = TtlCache::new();
        // Zero TTL expires immediately under the strict now < expiry check
        cache.set("key", &sample(), 0);

        let got: Option<TestData> = cache.get("key");
        assert!(got.is_none(), "Expired entry should read as absent");
        assert!(cache.is_empty(), "Expired entry should be removed on read");
    }

    #[test]
    fn test_contains_respects_expiry() {
        let cache = TtlCache::new();
        cache.set("fresh", &sample(), 60);
        cache.set("stale", &sample(), 0);

        assert!(cache.contains("fresh"));
        assert!(!cache.contains("stale"));
        assert!(!cache.contains("missing"));
    }

    #[test]
    fn test_overwrite_replaces_value() {
        let cache = TtlCache::new();
        cache.set("key", &sample(), 60);
        let updated = TestData {
            name: "second".to_string(),
            value: 7,
        };
        cache.set("key", &updated, 60);

        let got: Option<TestData> = cache.get("key");
        assert_eq!(got, Some(updated));
    }

    #[test]
    fn test_clear_wipes_unexpired_entries() {
        let cache = TtlCache::new();
        cache.set("a", &sample(), 3600);
        cache.set("b", &sample(), 86_400);
        assert_eq!(cache.len(), 2);

        cache.clear();

        assert!(cache.is_empty());
        let got: Option<TestData> = cache.get("a");
        assert!(got.is_none());
    }

    #[test]
    fn test_type_mismatch_reads_as_absent() {
        let cache = TtlCache::new();
        cache.set("key", &sample(), 60);

        // Stored shape does not decode as a plain number
        let got: Option<u32> = cache.get("key");
        assert!(got.is_none());
    }
}
