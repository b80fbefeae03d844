//! Registry of in-flight calls, one per key.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use futures_util::future::Shared;

use super::queue::CallFuture;

/// Shared handle every coalesced caller awaits.
pub(crate) type SharedCall<V> = Shared<CallFuture<V>>;

pub(crate) struct InFlight<V> {
    pub(crate) id: u64,
    pub(crate) call: SharedCall<V>,
}

/// Key → in-flight call map.
///
/// Each registration gets a fresh id so that a settling call only removes
/// its own entry, never a newer call registered under the same key.
pub(crate) struct InFlightRegistry<V> {
    calls: Mutex<HashMap<String, InFlight<V>>>,
    next_id: AtomicU64,
}

impl<V> InFlightRegistry<V> {
    pub(crate) fn new() -> Self {
        Self {
            calls: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, HashMap<String, InFlight<V>>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Drop the marker for `key` if it still belongs to call `id`.
    pub(crate) fn settle(&self, key: &str, id: u64) {
        let mut calls = self.lock();
        if calls.get(key).is_some_and(|entry| entry.id == id) {
            calls.remove(key);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use futures_util::FutureExt;

    use super::*;

    fn shared(v: u32) -> SharedCall<u32> {
        async move { Ok(v) }.boxed().shared()
    }

    #[test]
    fn settle_ignores_stale_id() {
        let registry = InFlightRegistry::new();
        let old = registry.next_id();
        let new = registry.next_id();
        registry.lock().insert(
            "k".into(),
            InFlight {
                id: new,
                call: shared(1),
            },
        );

        registry.settle("k", old);
        assert_eq!(registry.len(), 1);

        registry.settle("k", new);
        assert_eq!(registry.len(), 0);
    }
}
