//! In-memory query cache owned by the resolver.
//!
//! TTL: 5 minutes, checked lazily on read. Capacity: 100 entries.
//! Eviction is FIFO by insertion order; reads do not refresh an entry's
//! position, so this is not an LRU.

use super::types::{Country, Location};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

pub const CACHE_DURATION_MS: i64 = 5 * 60 * 1000;
pub const MAX_CACHE_ENTRIES: usize = 100;

/// Source of "now" in epoch millis. Injected so expiry can be tested.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default, Clone)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(start_millis: i64) -> Self {
        Self { now: Arc::new(AtomicI64::new(start_millis)) }
    }

    pub fn advance(&self, millis: i64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Composite cache key: `operation|query|country|limit`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn search(query: &str, country: &str, limit: usize) -> Self {
        Self(format!("search|{}|{}|{}", query, country, limit))
    }

    pub fn popular(country: &str, limit: usize) -> Self {
        Self(format!("popular||{}|{}", country, limit))
    }

    pub fn countries() -> Self {
        Self("countries|||".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// What a cache entry holds.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedData {
    Locations(Vec<Location>),
    Countries(Vec<Country>),
}

#[derive(Debug, Clone)]
struct CacheEntry {
    data: CachedData,
    timestamp: i64,
}

/// The resolver's query cache.
pub struct LocationCache {
    entries: HashMap<CacheKey, CacheEntry>,
    /// Keys in insertion order, oldest at the front.
    order: VecDeque<CacheKey>,
    clock: Arc<dyn Clock>,
    ttl_ms: i64,
    capacity: usize,
}

impl LocationCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_limits(clock, CACHE_DURATION_MS, MAX_CACHE_ENTRIES)
    }

    pub fn with_limits(clock: Arc<dyn Clock>, ttl_ms: i64, capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            clock,
            ttl_ms,
            capacity: capacity.max(1),
        }
    }

    /// Look up a key. Expired entries are removed and reported as missing.
    pub fn get(&mut self, key: &CacheKey) -> Option<CachedData> {
        let now = self.clock.now_millis();
        let expired = match self.entries.get(key) {
            Some(entry) if now - entry.timestamp < self.ttl_ms => {
                return Some(entry.data.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            self.remove(key);
        }
        None
    }

    pub fn get_locations(&mut self, key: &CacheKey) -> Option<Vec<Location>> {
        match self.get(key)? {
            CachedData::Locations(v) => Some(v),
            CachedData::Countries(_) => None,
        }
    }

    pub fn get_countries(&mut self, key: &CacheKey) -> Option<Vec<Country>> {
        match self.get(key)? {
            CachedData::Countries(v) => Some(v),
            CachedData::Locations(_) => None,
        }
    }

    /// Store a value. A new key past capacity evicts the oldest-inserted
    /// key; overwriting an existing key keeps its position.
    pub fn put(&mut self, key: CacheKey, data: CachedData) {
        let timestamp = self.clock.now_millis();
        if let Some(entry) = self.entries.get_mut(&key) {
            entry.data = data;
            entry.timestamp = timestamp;
            return;
        }

        if self.entries.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                tracing::debug!(key = oldest.as_str(), "evicting oldest cache entry");
                self.entries.remove(&oldest);
            }
        }

        self.order.push_back(key.clone());
        self.entries.insert(key, CacheEntry { data, timestamp });
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    fn remove(&mut self, key: &CacheKey) {
        self.entries.remove(key);
        self.order.retain(|k| k != key);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn city(id: &str, name: &str) -> Location {
        Location {
            id: id.into(),
            name: name.into(),
            country: "India".into(),
            state: None,
            coordinates: None,
            is_popular: false,
            population: None,
        }
    }

    fn test_cache() -> (LocationCache, ManualClock) {
        let clock = ManualClock::new(1_700_000_000_000);
        (LocationCache::new(Arc::new(clock.clone())), clock)
    }

    #[test]
    fn test_cache_put_get() {
        let (mut cache, _clock) = test_cache();
        let key = CacheKey::search("goa", "India", 10);
        cache.put(key.clone(), CachedData::Locations(vec![city("1", "Goa")]));

        let hit = cache.get_locations(&key).unwrap();
        assert_eq!(hit[0].name, "Goa");
        assert!(cache.get_countries(&key).is_none());
    }

    #[test]
    fn test_cache_miss() {
        let (mut cache, _clock) = test_cache();
        assert!(cache.get(&CacheKey::search("nowhere", "India", 10)).is_none());
    }

    #[test]
    fn test_key_shapes() {
        assert_eq!(CacheKey::search("pune", "India", 10).as_str(), "search|pune|India|10");
        assert_eq!(CacheKey::popular("India", 20).as_str(), "popular||India|20");
        assert_ne!(CacheKey::search("pune", "India", 10), CacheKey::search("pune", "India", 5));
    }

    #[test]
    fn test_expiry_is_lazy() {
        let (mut cache, clock) = test_cache();
        let key = CacheKey::countries();
        cache.put(key.clone(), CachedData::Countries(vec![Country { code: "IN".into(), name: "India".into() }]));

        clock.advance(CACHE_DURATION_MS - 1);
        assert!(cache.get(&key).is_some());

        clock.advance(1);
        assert!(cache.contains(&key));
        assert!(cache.get(&key).is_none());
        assert!(!cache.contains(&key));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_fifo_eviction() {
        let (mut cache, _clock) = test_cache();
        for i in 0..MAX_CACHE_ENTRIES {
            cache.put(CacheKey::search(&format!("q{i}"), "India", 10), CachedData::Locations(vec![]));
        }
        assert_eq!(cache.len(), MAX_CACHE_ENTRIES);

        // Reading the first key does not protect it.
        let first = CacheKey::search("q0", "India", 10);
        assert!(cache.get(&first).is_some());

        cache.put(CacheKey::search("q100", "India", 10), CachedData::Locations(vec![]));
        assert_eq!(cache.len(), MAX_CACHE_ENTRIES);
        assert!(!cache.contains(&first));
        assert!(cache.contains(&CacheKey::search("q1", "India", 10)));
    }

    #[test]
    fn test_overwrite_keeps_position() {
        let clock = ManualClock::new(0);
        let mut cache = LocationCache::with_limits(Arc::new(clock), CACHE_DURATION_MS, 2);
        let a = CacheKey::search("aa", "India", 10);
        let b = CacheKey::search("bb", "India", 10);
        cache.put(a.clone(), CachedData::Locations(vec![]));
        cache.put(b.clone(), CachedData::Locations(vec![]));
        cache.put(a.clone(), CachedData::Locations(vec![city("1", "Agra")]));
        assert_eq!(cache.len(), 2);

        cache.put(CacheKey::search("cc", "India", 10), CachedData::Locations(vec![]));
        assert!(!cache.contains(&a));
        assert!(cache.contains(&b));
    }

    #[test]
    fn test_clear() {
        let (mut cache, _clock) = test_cache();
        cache.put(CacheKey::countries(), CachedData::Countries(vec![]));
        cache.put(CacheKey::popular("India", 20), CachedData::Locations(vec![]));
        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.get(&CacheKey::countries()).is_none());
    }
}
