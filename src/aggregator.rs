//! Builds and caches the merged news list.
//!
//! # Request flow
//!
//! 1. A fresh cache entry is returned as-is, without touching the network
//! 2. Otherwise every source is fetched and parsed concurrently, one task per
//!    source, each bounded by the fetch timeout
//! 3. Results are merged in configured source order, deduplicated by link
//!    (first occurrence wins) and truncated to `max_items`
//! 4. The result is stored with a long TTL, or a short one when it is empty
//!
//! # Concurrent rebuilds
//!
//! Without single-flight, requests that all observe a stale cache each run a
//! full rebuild and the last one to finish wins the slot. With
//! [`Settings::single_flight`] they queue on a mutex and all but the first
//! are served from the entry the first one stored.

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use itertools::Itertools;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::cache::{CacheEntry, CacheStore};
use crate::config::Settings;
use crate::feeds::{FeedFetcher, parse_feed};
use crate::models::{FeedSource, NewsItem};

pub struct Aggregator<F, C> {
    fetcher: Arc<F>,
    cache: C,
    sources: Vec<FeedSource>,
    settings: Settings,
    rebuild_lock: Option<Mutex<()>>,
}

impl<F, C> Aggregator<F, C>
where
    F: FeedFetcher,
    C: CacheStore,
{
    pub fn new(fetcher: F, cache: C, sources: Vec<FeedSource>, settings: Settings) -> Self {
        let rebuild_lock = settings.single_flight.then(|| Mutex::new(()));
        Self {
            fetcher: Arc::new(fetcher),
            cache,
            sources,
            settings,
            rebuild_lock,
        }
    }

    /// Current news, rebuilding first if the cache is stale or empty.
    #[instrument(level = "info", skip_all)]
    pub async fn news(&self) -> CacheEntry {
        if let Some(entry) = self.cache.get() {
            debug!(count = entry.items.len(), ttl_secs = entry.ttl.as_secs(), "Cache hit");
            return entry;
        }

        match &self.rebuild_lock {
            Some(lock) => {
                let _guard = lock.lock().await;
                // Another request may have rebuilt while we waited.
                if let Some(entry) = self.cache.get() {
                    debug!(count = entry.items.len(), "Cache filled while waiting for rebuild");
                    return entry;
                }
                self.rebuild().await
            }
            None => self.rebuild().await,
        }
    }

    /// Fetch every source, merge, and replace the cache entry.
    #[instrument(level = "info", skip_all, fields(sources = self.sources.len()))]
    pub async fn rebuild(&self) -> CacheEntry {
        let t0 = Instant::now();
        let per_source = self.collect().await;
        let candidates: usize = per_source.iter().map(Vec::len).sum();

        let items = merge(per_source, self.settings.max_items);
        let ttl = self.settings.ttl_for(items.len());
        info!(
            candidates,
            kept = items.len(),
            ttl_secs = ttl.as_secs(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Rebuilt news cache"
        );

        self.cache.set(items, ttl)
    }

    /// Items per source, in configured source order.
    ///
    /// A source that fails, exceeds the timeout, or whose task panics
    /// contributes an empty list.
    async fn collect(&self) -> Vec<Vec<NewsItem>> {
        let timeout = self.settings.fetch_timeout;
        let tasks = self.sources.iter().cloned().map(|source| {
            let fetcher = Arc::clone(&self.fetcher);
            tokio::spawn(async move {
                match tokio::time::timeout(timeout, fetcher.fetch(&source)).await {
                    Ok(Some(body)) => parse_feed(&body, &source),
                    Ok(None) => Vec::new(),
                    Err(_) => {
                        warn!(source = %source.name, ?timeout, "Feed fetch cancelled after timeout");
                        Vec::new()
                    }
                }
            })
        });

        join_all(tasks)
            .await
            .into_iter()
            .zip(&self.sources)
            .map(|(result, source)| match result {
                Ok(items) => {
                    debug!(source = %source.name, count = items.len(), "Source settled");
                    items
                }
                Err(e) => {
                    error!(source = %source.name, error = %e, "Feed task aborted");
                    Vec::new()
                }
            })
            .collect()
    }
}

/// Flatten in source order, keep the first item per link, and truncate.
fn merge(per_source: Vec<Vec<NewsItem>>, max_items: usize) -> Vec<NewsItem> {
    per_source
        .into_iter()
        .flatten()
        .unique_by(|item| item.link.clone())
        .take(max_items)
        .collect()
}
