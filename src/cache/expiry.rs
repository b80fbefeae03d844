//! Per-entry expiry policy.

use std::time::{Duration, Instant};

use moka::Expiry;

use super::CacheEntry;

/// Expires each entry after the TTL stored in the entry itself.
///
/// moka's default `expire_after_update` keeps the remaining lifetime of the
/// old value; an overwrite here restarts the clock with the new TTL instead.
/// Reads never extend an entry's lifetime.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntryExpiry;

impl<V> Expiry<String, CacheEntry<V>> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CacheEntry<V>,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CacheEntry<V>,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}
