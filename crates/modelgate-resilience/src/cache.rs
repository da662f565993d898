//! Fingerprint-addressed response cache.
//!
//! Stores completed responses keyed by request [`Fingerprint`], with a
//! strict TTL enforced at read time and exact least-recently-used
//! eviction when the capacity bound is reached. The store is in-memory;
//! `get` and `put` return `Result` so the gateway treats a backend
//! failure as a miss rather than a request failure, and an external
//! backend can be swapped in behind the same surface.

use modelgate_core::{CachedCompletion, Fingerprint, GatewayResult};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

/// Cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Whether caching is enabled
    pub enabled: bool,
    /// Maximum number of entries before LRU eviction
    pub capacity: usize,
    /// TTL applied to every entry
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: 10_000,
            ttl: Duration::from_secs(3600),
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Total cache hits
    pub hits: u64,
    /// Total cache misses
    pub misses: u64,
    /// Entries evicted to make room
    pub evictions: u64,
    /// Entries dropped because their TTL elapsed
    pub expired: u64,
    /// Current number of entries
    pub entries: usize,
}

impl CacheStats {
    /// Hit rate as a percentage
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64 * 100.0
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    payload: CachedCompletion,
    created_at: Instant,
    /// Monotonic recency stamp; smallest value is the LRU victim
    last_used: u64,
    hits: u64,
}

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<Fingerprint, CacheEntry>,
    /// Recency counter, bumped on every insert and hit
    tick: u64,
    stats: CacheStats,
}

/// Fingerprint-addressed response cache
pub struct ResponseCache {
    config: CacheConfig,
    inner: Mutex<CacheInner>,
}

impl ResponseCache {
    /// Create a new cache
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(CacheInner::default()),
        }
    }

    /// Create with default configuration
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(CacheConfig::default())
    }

    /// Create a disabled cache
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(CacheConfig {
            enabled: false,
            ..Default::default()
        })
    }

    /// Whether caching is enabled
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Look up a fingerprint.
    ///
    /// An entry past its TTL is removed here and reported as a miss,
    /// regardless of any background sweeping.
    ///
    /// # Errors
    /// The in-memory store is infallible; the `Result` is part of the
    /// backend contract.
    pub fn get(&self, fingerprint: &Fingerprint) -> GatewayResult<Option<CachedCompletion>> {
        if !self.config.enabled {
            return Ok(None);
        }
        let mut inner = self.inner.lock();
        inner.tick += 1;
        let tick = inner.tick;

        let expired = match inner.entries.get_mut(fingerprint) {
            Some(entry) if entry.created_at.elapsed() > self.config.ttl => true,
            Some(entry) => {
                entry.last_used = tick;
                entry.hits += 1;
                let payload = entry.payload.clone();
                let hits = entry.hits;
                inner.stats.hits += 1;
                debug!(fingerprint = %fingerprint, hits, "Cache hit");
                return Ok(Some(payload));
            }
            None => false,
        };

        if expired {
            inner.entries.remove(fingerprint);
            inner.stats.expired += 1;
            inner.stats.entries = inner.entries.len();
            debug!(fingerprint = %fingerprint, "Cache miss (expired)");
        } else {
            debug!(fingerprint = %fingerprint, "Cache miss");
        }
        inner.stats.misses += 1;
        Ok(None)
    }

    /// Store a completion under its fingerprint.
    ///
    /// When the cache is at capacity, expired entries are dropped
    /// first; if it is still full, the least recently used entry is
    /// evicted.
    ///
    /// # Errors
    /// The in-memory store is infallible; the `Result` is part of the
    /// backend contract.
    pub fn put(&self, fingerprint: Fingerprint, payload: CachedCompletion) -> GatewayResult<()> {
        if !self.config.enabled || self.config.capacity == 0 {
            return Ok(());
        }
        let mut inner = self.inner.lock();
        inner.tick += 1;
        let tick = inner.tick;

        if inner.entries.len() >= self.config.capacity
            && !inner.entries.contains_key(&fingerprint)
        {
            self.make_room(&mut inner);
        }

        inner.entries.insert(
            fingerprint,
            CacheEntry {
                payload,
                created_at: Instant::now(),
                last_used: tick,
                hits: 0,
            },
        );
        inner.stats.entries = inner.entries.len();
        Ok(())
    }

    fn make_room(&self, inner: &mut CacheInner) {
        let ttl = self.config.ttl;
        let before = inner.entries.len();
        inner.entries.retain(|_, entry| entry.created_at.elapsed() <= ttl);
        inner.stats.expired += (before - inner.entries.len()) as u64;

        if inner.entries.len() >= self.config.capacity {
            let victim = inner
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(key, _)| *key);
            if let Some(key) = victim {
                inner.entries.remove(&key);
                inner.stats.evictions += 1;
                debug!(fingerprint = %key, "LRU eviction");
            }
        }
    }

    /// Drop every expired entry; called from a background interval
    pub fn sweep_expired(&self) {
        let mut inner = self.inner.lock();
        let ttl = self.config.ttl;
        let before = inner.entries.len();
        inner.entries.retain(|_, entry| entry.created_at.elapsed() <= ttl);
        let removed = before - inner.entries.len();
        inner.stats.expired += removed as u64;
        inner.stats.entries = inner.entries.len();
        if removed > 0 {
            debug!(removed, "Expired cache entries swept");
        }
    }

    /// Remove all entries
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.stats.entries = 0;
    }

    /// Current statistics
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats.clone()
    }
}
