//! The single cached news result.
//!
//! There is exactly one slot: each rebuild replaces it wholesale and nothing
//! ever deletes it. The store is built once in `main` and handed to the
//! aggregator, so tests can swap in their own clock.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::models::NewsItem;

/// Source of "now" for freshness checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock used in production.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[cfg(test)]
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<std::sync::Mutex<DateTime<Utc>>>,
}

#[cfg(test)]
impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(std::sync::Mutex::new(start)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += chrono::Duration::from_std(by).unwrap();
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// One built result and the window during which it may be served.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub timestamp: DateTime<Utc>,
    pub ttl: Duration,
    pub items: Arc<Vec<NewsItem>>,
}

impl CacheEntry {
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.timestamp).to_std().unwrap_or(Duration::ZERO)
    }

    /// Fresh while `age < ttl`; an entry is stale the instant its TTL elapses.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.age(now) < self.ttl
    }
}

/// Storage for the cached result.
pub trait CacheStore: Send + Sync {
    /// The current entry, if one exists and is still fresh.
    fn get(&self) -> Option<CacheEntry>;

    /// Replace the slot with `items`, stamped with the current time.
    fn set(&self, items: Vec<NewsItem>, ttl: Duration) -> CacheEntry;
}

/// In-process cache slot.
#[derive(Debug)]
pub struct MemoryCache<C = SystemClock> {
    clock: C,
    slot: RwLock<Option<CacheEntry>>,
}

impl<C: Clock> MemoryCache<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            slot: RwLock::new(None),
        }
    }
}

impl<C: Clock> CacheStore for MemoryCache<C> {
    fn get(&self) -> Option<CacheEntry> {
        let slot = self.slot.read().unwrap_or_else(|e| e.into_inner());
        slot.as_ref()
            .filter(|entry| entry.is_fresh(self.clock.now()))
            .cloned()
    }

    fn set(&self, items: Vec<NewsItem>, ttl: Duration) -> CacheEntry {
        let entry = CacheEntry {
            timestamp: self.clock.now(),
            ttl,
            items: Arc::new(items),
        };
        let mut slot = self.slot.write().unwrap_or_else(|e| e.into_inner());
        *slot = Some(entry.clone());
        entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn item(link: &str) -> NewsItem {
        NewsItem {
            title: format!("Title for {link}"),
            link: link.to_string(),
            source: "test".to_string(),
            published_at: None,
            image: None,
        }
    }

    fn clock() -> ManualClock {
        ManualClock::new(Utc.with_ymd_and_hms(2025, 1, 6, 8, 0, 0).unwrap())
    }

    #[test]
    fn test_empty_cache_returns_none() {
        let cache = MemoryCache::new(clock());
        assert!(cache.get().is_none());
    }

    #[test]
    fn test_entry_fresh_until_ttl_elapses() {
        let clock = clock();
        let cache = MemoryCache::new(clock.clone());
        cache.set(vec![item("https://a/1")], Duration::from_secs(300));

        clock.advance(Duration::from_secs(299));
        let entry = cache.get().expect("entry should still be fresh");
        assert_eq!(entry.items.len(), 1);
        assert_eq!(entry.age(clock.now()), Duration::from_secs(299));

        clock.advance(Duration::from_secs(1));
        assert!(cache.get().is_none());
    }

    #[test]
    fn test_set_replaces_previous_entry() {
        let clock = clock();
        let cache = MemoryCache::new(clock.clone());
        cache.set(vec![item("https://a/1")], Duration::from_secs(300));
        clock.advance(Duration::from_secs(10));
        cache.set(
            vec![item("https://b/1"), item("https://b/2")],
            Duration::from_secs(604_800),
        );

        let entry = cache.get().unwrap();
        assert_eq!(entry.items.len(), 2);
        assert_eq!(entry.items[0].link, "https://b/1");
        assert_eq!(entry.ttl, Duration::from_secs(604_800));
        assert_eq!(entry.timestamp, clock.now());
    }
}
