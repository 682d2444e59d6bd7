//! TTL response cache keyed by a 32-bit hash of the request URL.

use crate::prtg::metrics::ApiMetrics;
use crate::prtg::normalize::Payload;

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

/// Cached response with the URL it was stored under
#[derive(Debug, Clone)]
pub struct CacheEntry {
    url: String,
    payload: Payload,
    stored_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.stored_at) >= ttl
    }
}

/// 32-bit rolling hash of a string (`h = 31 * h + c` over UTF-16 units).
pub fn url_hash(s: &str) -> i32 {
    s.encode_utf16()
        .fold(0i32, |hash, unit| hash.wrapping_mul(31).wrapping_add(unit as i32))
}

/// Response cache keyed by request URL.
///
/// Entries live for `ttl`. Expired entries are dropped when read, by `sweep`,
/// or by the background sweeper; a full table evicts its oldest entry.
#[derive(Debug)]
pub struct ResponseCache {
    entries: DashMap<i32, CacheEntry>,
    ttl: Duration,
    capacity: usize,
    metrics: Arc<ApiMetrics>,
}

impl ResponseCache {
    pub fn new(ttl: Duration, capacity: usize, metrics: Arc<ApiMetrics>) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            capacity: capacity.max(1),
            metrics,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, url: &str) -> Option<Payload> {
        let key = url_hash(url);
        let now = Instant::now();

        let (payload, expired) = match self.entries.get(&key) {
            Some(entry) if entry.url != url => (None, false),
            Some(entry) if entry.is_expired(now, self.ttl) => (None, true),
            Some(entry) => (Some(entry.payload.clone()), false),
            None => (None, false),
        };

        if expired {
            let ttl = self.ttl;
            if self
                .entries
                .remove_if(&key, |_, entry| entry.is_expired(now, ttl))
                .is_some()
            {
                self.metrics.record_cache_evictions(1);
            }
        }

        match payload {
            Some(payload) => {
                self.metrics.record_cache_hit();
                Some(payload)
            }
            None => {
                self.metrics.record_cache_miss();
                None
            }
        }
    }

    pub fn put(&self, url: &str, payload: Payload) -> Payload {
        let key = url_hash(url);

        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            self.sweep();
            if self.entries.len() >= self.capacity {
                self.evict_oldest();
            }
        }

        self.entries.insert(
            key,
            CacheEntry {
                url: url.to_string(),
                payload: payload.clone(),
                stored_at: Instant::now(),
            },
        );
        payload
    }

    /// Removes all expired entries, returning how many were dropped.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let ttl = self.ttl;
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now, ttl));
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            self.metrics.record_cache_evictions(removed as u64);
        }
        removed
    }

    fn evict_oldest(&self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.stored_at)
            .map(|entry| *entry.key());

        if let Some(key) = oldest {
            if self.entries.remove(&key).is_some() {
                self.metrics.record_cache_evictions(1);
                debug!("Evicted oldest cache entry {}", key);
            }
        }
    }

    /// Sweeps on every `interval` tick until the cache is dropped.
    pub fn spawn_sweeper(cache: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let cache = Arc::downgrade(cache);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(cache) = cache.upgrade() else {
                    break;
                };
                let removed = cache.sweep();
                if removed > 0 {
                    debug!("Swept {} expired cache entries", removed);
                }
            }
        })
    }
}
