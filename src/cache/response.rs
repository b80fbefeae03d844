//! In-memory response cache with per-entry TTL.
//!
//! [`ResponseCache`] stores opaque response values keyed by string. Unlike a
//! cache with a single global TTL, every insert names its own validity
//! window: a product listing may live for five minutes while a stock count
//! lives for ten seconds.
//!
//! # Validity
//!
//! An entry is valid iff `now - cached_at < ttl`. moka evicts expired
//! entries in the background, but reads also check the entry's own clock
//! and purge a stale entry on the spot, so a read never returns data past
//! its TTL regardless of housekeeping timing.

use std::time::{Duration, Instant};

use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use regex::Regex;
use serde::{Deserialize, Deserializer};

use super::EntryExpiry;

/// Configuration for the response cache.
///
/// ```rust
/// # use saddlery::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .max_entries(2_000)
///     .default_ttl(Duration::from_secs(60));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of cached entries. Default: 10,000.
    pub max_entries: u64,
    /// TTL applied when a caller does not name one. Default: 5 minutes.
    #[serde(rename = "default_ttl_secs", deserialize_with = "duration_secs")]
    pub default_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            default_ttl: Duration::from_secs(300),
        }
    }
}

impl CacheConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of cached entries.
    pub fn max_entries(mut self, n: u64) -> Self {
        self.max_entries = n;
        self
    }

    /// Set the TTL used when none is given explicitly.
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }
}

pub(crate) fn duration_secs<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
    u64::deserialize(d).map(Duration::from_secs)
}

/// A cached value together with its capture time and validity window.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub data: V,
    pub cached_at: Instant,
    pub ttl: Duration,
}

impl<V> CacheEntry<V> {
    /// Capture `data` now with the given TTL.
    pub fn new(data: V, ttl: Duration) -> Self {
        Self {
            data,
            cached_at: Instant::now(),
            ttl,
        }
    }

    /// Whether the entry is still inside its validity window.
    pub fn is_valid(&self) -> bool {
        self.cached_at.elapsed() < self.ttl
    }
}

/// Bounded, thread-safe response cache keyed by string.
///
/// Cloning is cheap and clones share storage.
#[derive(Clone)]
pub struct ResponseCache<V> {
    entries: Cache<String, CacheEntry<V>>,
    default_ttl: Duration,
}

impl<V> ResponseCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create a new cache with the given configuration.
    ///
    /// Eviction is LRU: an insert is always admitted, and at capacity the
    /// least recently used entry makes room for it.
    pub fn new(config: &CacheConfig) -> Self {
        let entries = Cache::builder()
            .max_capacity(config.max_entries)
            .eviction_policy(EvictionPolicy::lru())
            .expire_after(EntryExpiry)
            .build();
        Self {
            entries,
            default_ttl: config.default_ttl,
        }
    }

    /// TTL applied when `insert` is given `None`.
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Insert (or overwrite) `data` under `key`.
    pub fn insert(&self, key: impl Into<String>, data: V, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or(self.default_ttl);
        self.entries.insert(key.into(), CacheEntry::new(data, ttl));
    }

    /// Look up a valid entry.
    ///
    /// Returns `None` on a miss. A stale entry found on the way is removed.
    pub fn get(&self, key: &str) -> Option<V> {
        self.entry(key).map(|entry| entry.data)
    }

    /// Look up a valid entry including its metadata.
    pub fn entry(&self, key: &str) -> Option<CacheEntry<V>> {
        let entry = self.entries.get(key)?;
        if entry.is_valid() {
            Some(entry)
        } else {
            self.entries.invalidate(key);
            None
        }
    }

    /// Whether `key` holds a valid entry.
    pub fn contains(&self, key: &str) -> bool {
        self.entry(key).is_some()
    }

    /// Remove a single key. Returns whether a valid entry was removed.
    pub fn remove(&self, key: &str) -> bool {
        self.entries.remove(key).is_some_and(|entry| entry.is_valid())
    }

    /// Remove every valid key matched by `pattern`. Returns the number removed.
    pub fn remove_matching(&self, pattern: &Regex) -> usize {
        let matched: Vec<String> = self
            .keys()
            .into_iter()
            .filter(|key| pattern.is_match(key))
            .collect();
        for key in &matched {
            self.entries.invalidate(key);
        }
        matched.len()
    }

    /// Evict all entries.
    pub fn clear(&self) {
        self.entries.invalidate_all();
        self.entries.run_pending_tasks();
    }

    /// Keys of all valid entries. Order is not guaranteed.
    pub fn keys(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.is_valid())
            .map(|(key, _)| (*key).clone())
            .collect()
    }

    /// Number of valid entries.
    pub fn len(&self) -> usize {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.is_valid())
            .count()
    }

    /// Whether the cache holds no valid entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
