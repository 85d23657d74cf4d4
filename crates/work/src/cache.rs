//! Owned time-to-live cache.
//!
//! Each entry carries its own expiry instant. Expired entries are dropped
//! when read or on [`TtlCache::purge_expired`]. A TTL too large to represent
//! as an instant never expires.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

struct Entry<V> {
    value: V,
    expires_at: Option<Instant>,
}

impl<V> Entry<V> {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

/// A map from key to (value, expiry).
pub struct TtlCache<K, V> {
    entries: HashMap<K, Entry<V>>,
    default_ttl: Duration,
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
    /// Create an empty cache whose entries live for `default_ttl`.
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            default_ttl,
        }
    }

    /// Get a live value, evicting it if it has expired.
    pub fn get(&mut self, key: &K) -> Option<V> {
        let expired = match self.entries.get(key) {
            Some(entry) if entry.is_live(Instant::now()) => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove(key);
        }
        None
    }

    /// Insert a value with the default TTL.
    pub fn set(&mut self, key: K, value: V) {
        let ttl = self.default_ttl;
        self.set_with_ttl(key, value, ttl);
    }

    /// Insert a value with an explicit TTL.
    pub fn set_with_ttl(&mut self, key: K, value: V, ttl: Duration) {
        self.entries.insert(
            key,
            Entry {
                value,
                expires_at: Instant::now().checked_add(ttl),
            },
        );
    }

    /// Remove one key.
    pub fn invalidate(&mut self, key: &K) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Remove everything.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn purge_expired(&mut self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        before - self.entries.len()
    }

    /// Entries currently held, expired or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds nothing.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let mut cache = TtlCache::new(Duration::from_secs(60));
        cache.set("a", 1);
        assert_eq!(cache.get(&"a"), Some(1));
        assert_eq!(cache.get(&"b"), None);
    }

    #[test]
    fn test_expired_entry_is_evicted_on_read() {
        let mut cache = TtlCache::new(Duration::from_secs(60));
        cache.set_with_ttl("a", 1, Duration::ZERO);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&"a"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalidate_and_clear() {
        let mut cache = TtlCache::new(Duration::from_secs(60));
        cache.set(1, "x");
        cache.set(2, "y");

        assert!(cache.invalidate(&1));
        assert!(!cache.invalidate(&1));
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_unrepresentable_ttl_never_expires() {
        let mut cache = TtlCache::new(Duration::from_secs(u64::MAX));
        cache.set("a", 1);
        assert_eq!(cache.get(&"a"), Some(1));
        assert_eq!(cache.purge_expired(), 0);
    }

    #[test]
    fn test_purge_expired() {
        let mut cache = TtlCache::new(Duration::from_secs(60));
        cache.set(1, "live");
        cache.set_with_ttl(2, "dead", Duration::ZERO);
        cache.set_with_ttl(3, "dead", Duration::ZERO);

        assert_eq!(cache.purge_expired(), 2);
        assert_eq!(cache.get(&1), Some("live"));
    }
}
