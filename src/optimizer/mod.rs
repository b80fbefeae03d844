//! Request-coalescing API optimizer.
//!
//! [`ApiOptimizer`] sits between data consumers and the backend. It combines
//! three mechanisms:
//!
//! - a [`ResponseCache`] with per-entry TTL,
//! - an in-flight registry that collapses concurrent identical calls into
//!   one underlying fetch (at most one in flight per key),
//! - a priority queue for preloading, drained one call at a time and gated
//!   on dependency keys being cached.
//!
//! # Lifetime
//!
//! An optimizer is an ordinary value: construct one per client (or per
//! test) and hand out clones. Clones share state. [`ApiOptimizer::dispose`]
//! drops everything it holds and rejects further work.
//!
//! # Runtime
//!
//! Fetches run as tokio tasks, so a fetch keeps going even if every caller
//! awaiting it is dropped; its result still lands in the cache. There is no
//! cancellation and no timeout at this layer.

mod inflight;
pub mod queue;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::FutureExt;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::{CacheConfig, ResponseCache};
use crate::telemetry;
use crate::{Result, SaddleryError};

use inflight::{InFlight, InFlightRegistry, SharedCall};
use queue::{CallQueue, Next};
pub use queue::{CallFuture, CallThunk, DependencyPolicy, Priority, QueuedCall};

/// Configuration for an [`ApiOptimizer`].
///
/// ```rust
/// # use saddlery::{CacheConfig, DependencyPolicy, OptimizerConfig};
/// # use std::time::Duration;
/// let config = OptimizerConfig::new()
///     .cache(CacheConfig::new().default_ttl(Duration::from_secs(60)))
///     .dependency_policy(DependencyPolicy::StopOnUnmet);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptimizerConfig {
    pub cache: CacheConfig,
    pub dependency_policy: DependencyPolicy,
}

impl OptimizerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    pub fn dependency_policy(mut self, policy: DependencyPolicy) -> Self {
        self.dependency_policy = policy;
        self
    }
}

/// Diagnostic snapshot of an optimizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Number of valid cache entries.
    pub size: usize,
    /// Keys of valid cache entries, sorted.
    pub keys: Vec<String>,
    /// Calls currently in flight.
    pub pending_calls: usize,
    /// Calls waiting in the queue.
    pub queued_calls: usize,
}

/// What a single drain pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Calls that ran and succeeded (including ones served from cache).
    pub executed: usize,
    /// Calls that ran and failed. Failed calls are not re-queued.
    pub failed: usize,
    /// Calls left in the queue whose dependencies were not cached when the
    /// pass ended.
    pub blocked: usize,
    /// Another drain pass was already running; this one did nothing.
    pub already_running: bool,
}

struct Inner<V> {
    config: OptimizerConfig,
    cache: ResponseCache<V>,
    in_flight: InFlightRegistry<V>,
    queue: Mutex<CallQueue<V>>,
    processing: AtomicBool,
    disposed: AtomicBool,
}

impl<V> Inner<V> {
    fn lock_queue(&self) -> MutexGuard<'_, CallQueue<V>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

/// Response cache + request coalescer + preload queue.
///
/// ```rust
/// # use saddlery::ApiOptimizer;
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> saddlery::Result<()> {
/// let optimizer: ApiOptimizer<String> = ApiOptimizer::default();
/// let value = optimizer
///     .batch_call("greeting", || async { Ok("hello".to_string()) }, None)
///     .await?;
/// assert_eq!(value, "hello");
/// assert_eq!(optimizer.get_cache("greeting").as_deref(), Some("hello"));
/// # Ok(())
/// # }
/// ```
pub struct ApiOptimizer<V> {
    inner: Arc<Inner<V>>,
}

impl<V> Clone for ApiOptimizer<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> Default for ApiOptimizer<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(OptimizerConfig::default())
    }
}

impl<V> ApiOptimizer<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create an optimizer with its own, empty state.
    pub fn new(config: OptimizerConfig) -> Self {
        let cache = ResponseCache::new(&config.cache);
        Self {
            inner: Arc::new(Inner {
                config,
                cache,
                in_flight: InFlightRegistry::new(),
                queue: Mutex::new(CallQueue::new()),
                processing: AtomicBool::new(false),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.inner.config
    }

    /// Store `data` under `key`, replacing any existing entry.
    ///
    /// `ttl = None` uses the configured default. A no-op once disposed.
    pub fn set_cache(&self, key: impl Into<String>, data: V, ttl: Option<Duration>) {
        let _calls = self.inner.in_flight.lock();
        if !self.inner.is_disposed() {
            self.inner.cache.insert(key, data, ttl);
        }
    }

    /// Cached data for `key`, or `None` if absent, expired or disposed.
    ///
    /// An expired entry is removed by the read that finds it.
    pub fn get_cache(&self, key: &str) -> Option<V> {
        if self.inner.is_disposed() {
            return None;
        }
        let hit = self.inner.cache.get(key);
        record_lookup("get_cache", hit.is_some());
        hit
    }

    /// Fetch `key` through the cache, coalescing concurrent callers.
    ///
    /// 1. A valid cache entry is returned without calling `fetch`.
    /// 2. If a call for `key` is already in flight, this caller joins it and
    ///    receives the same value or the same error.
    /// 3. Otherwise `fetch` is spawned; on success its value is cached with
    ///    `ttl` (or the default). The in-flight marker is removed when the
    ///    fetch settles, whether it succeeded, failed or panicked.
    ///
    /// Errors are never cached: the next call after a failure fetches again.
    ///
    /// # Panics
    ///
    /// Requires a tokio runtime context (called within an async fn).
    pub async fn batch_call<F, Fut>(
        &self,
        key: impl Into<String>,
        fetch: F,
        ttl: Option<Duration>,
    ) -> Result<V>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let key = key.into();

        let call = {
            // Cache lookup happens under the registry lock: a settling call
            // caches its value before it drops its marker, so a caller never
            // sees neither.
            let mut calls = self.inner.in_flight.lock();
            if self.inner.is_disposed() {
                return Err(SaddleryError::Disposed);
            }
            let hit = self.inner.cache.get(&key);
            record_lookup("batch_call", hit.is_some());
            if let Some(data) = hit {
                return Ok(data);
            }

            match calls.get(&key) {
                Some(entry) => {
                    metrics::counter!(telemetry::COALESCED_CALLS_TOTAL).increment(1);
                    debug!(key = %key, "joining in-flight call");
                    entry.call.clone()
                }
                None => {
                    let id = self.inner.in_flight.next_id();
                    let call = self.spawn_fetch(key.clone(), id, fetch, ttl);
                    calls.insert(
                        key.clone(),
                        InFlight {
                            id,
                            call: call.clone(),
                        },
                    );
                    call
                }
            }
        };

        call.await
    }

    fn spawn_fetch<F, Fut>(
        &self,
        key: String,
        id: u64,
        fetch: F,
        ttl: Option<Duration>,
    ) -> SharedCall<V>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        debug!(key = %key, "starting fetch");

        let task = tokio::spawn(async move {
            let settle = SettleGuard {
                inner: Arc::clone(&inner),
                key: key.clone(),
                id,
            };
            let result = fetch().await;
            match &result {
                Ok(data) => {
                    metrics::counter!(telemetry::FETCHES_TOTAL, "status" => "ok").increment(1);
                    // Checked under the registry lock, which dispose holds
                    // while it sets the flag and clears the cache.
                    let _calls = inner.in_flight.lock();
                    if !inner.is_disposed() {
                        inner.cache.insert(key.clone(), data.clone(), ttl);
                    }
                }
                Err(e) => {
                    metrics::counter!(telemetry::FETCHES_TOTAL, "status" => "error").increment(1);
                    debug!(key = %key, error = %e, "fetch failed, nothing cached");
                }
            }
            drop(settle);
            result
        });

        async move {
            task.await
                .unwrap_or_else(|e| Err(SaddleryError::CallAborted(e.to_string())))
        }
        .boxed()
        .shared()
    }

    /// Append a call to the queue and start a drain pass if none is running.
    ///
    /// The drain runs as a spawned task. Calls queued on a disposed
    /// optimizer are dropped.
    ///
    /// # Panics
    ///
    /// Requires a tokio runtime context.
    pub fn queue_call(&self, call: QueuedCall<V>) {
        if self.inner.is_disposed() {
            warn!(key = call.key(), "optimizer disposed, dropping queued call");
            return;
        }

        let idle = {
            let mut queue = self.inner.lock_queue();
            debug!(key = call.key(), "queueing call");
            queue.push(call);
            metrics::gauge!(telemetry::QUEUE_DEPTH).set(queue.len() as f64);
            !self.inner.processing.load(Ordering::Acquire)
        };

        if idle {
            let this = self.clone();
            tokio::spawn(async move {
                this.process_queue().await;
            });
        }
    }

    /// Run one drain pass over the queue.
    ///
    /// Each step stable-sorts the remaining calls by priority and runs the
    /// next ready call through [`batch_call`](Self::batch_call). How a call
    /// with uncached dependencies is handled depends on the configured
    /// [`DependencyPolicy`]. Only one pass runs at a time; a concurrent
    /// invocation returns immediately with `already_running` set.
    pub async fn process_queue(&self) -> DrainReport {
        let mut report = DrainReport::default();
        if self.inner.processing.swap(true, Ordering::AcqRel) {
            report.already_running = true;
            return report;
        }
        let mut processing = ProcessingGuard {
            flag: &self.inner.processing,
            held: true,
        };
        let policy = self.inner.config.dependency_policy;
        let is_ready = |call: &QueuedCall<V>| {
            call.dependencies()
                .iter()
                .all(|dep| self.inner.cache.contains(dep))
        };

        loop {
            let next = {
                let mut queue = self.inner.lock_queue();
                let next = queue.take_next(policy, is_ready);
                metrics::gauge!(telemetry::QUEUE_DEPTH).set(queue.len() as f64);
                if !matches!(next, Next::Ready(_)) {
                    // Released under the queue lock so a concurrent
                    // queue_call either sees the flag set (and we already
                    // drained its call) or sees it clear and starts a pass.
                    processing.release();
                    report.blocked = queue.count_unready(is_ready);
                }
                next
            };

            match next {
                Next::Ready(call) => {
                    let (key, fetch, priority, ttl) = call.into_parts();
                    match self.batch_call(key.clone(), fetch, ttl).await {
                        Ok(_) => {
                            report.executed += 1;
                            metrics::counter!(telemetry::QUEUE_EXECUTIONS_TOTAL,
                                "priority" => priority.as_str(),
                                "status" => "ok",
                            )
                            .increment(1);
                        }
                        Err(e) => {
                            report.failed += 1;
                            metrics::counter!(telemetry::QUEUE_EXECUTIONS_TOTAL,
                                "priority" => priority.as_str(),
                                "status" => "error",
                            )
                            .increment(1);
                            warn!(key = %key, %priority, error = %e, "queued call failed");
                        }
                    }
                }
                Next::Blocked => {
                    metrics::counter!(telemetry::QUEUE_BLOCKED_TOTAL).increment(1);
                    debug!(
                        blocked = report.blocked,
                        "drain pass stopped on unmet dependencies"
                    );
                    break;
                }
                Next::Empty => break,
            }
        }

        report
    }

    /// Clear cached entries.
    ///
    /// `None` removes everything. `Some(pattern)` removes every key matching
    /// `pattern` as a regular expression; no match is a no-op. Returns the
    /// number of entries removed.
    pub fn clear_cache(&self, pattern: Option<&str>) -> Result<usize> {
        let removed = match pattern {
            None => {
                let removed = self.inner.cache.len();
                self.inner.cache.clear();
                removed
            }
            Some(pattern) => {
                let re = Regex::new(pattern).map_err(|e| SaddleryError::InvalidPattern {
                    pattern: pattern.to_string(),
                    message: e.to_string(),
                })?;
                self.inner.cache.remove_matching(&re)
            }
        };
        debug!(?pattern, removed, "cache cleared");
        Ok(removed)
    }

    /// Diagnostic snapshot: cache size and keys, in-flight and queued counts.
    pub fn cache_stats(&self) -> CacheStats {
        let mut keys = self.inner.cache.keys();
        keys.sort();
        CacheStats {
            size: keys.len(),
            keys,
            pending_calls: self.inner.in_flight.len(),
            queued_calls: self.inner.lock_queue().len(),
        }
    }

    /// Keys waiting in the queue, in their current order.
    pub fn queued_keys(&self) -> Vec<String> {
        self.inner.lock_queue().keys()
    }

    /// Release everything this optimizer holds.
    ///
    /// Clears the cache, the queue and the in-flight registry. Fetches that
    /// are already running finish but their results are not cached. Later
    /// `batch_call`s fail with [`SaddleryError::Disposed`].
    pub fn dispose(&self) {
        {
            let mut calls = self.inner.in_flight.lock();
            self.inner.disposed.store(true, Ordering::Release);
            calls.clear();
            self.inner.cache.clear();
        }
        self.inner.lock_queue().clear();
        info!("api optimizer disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }
}

fn record_lookup(source: &'static str, hit: bool) {
    if hit {
        metrics::counter!(telemetry::CACHE_HITS_TOTAL, "source" => source).increment(1);
    } else {
        metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "source" => source).increment(1);
    }
}

/// Removes the in-flight marker when the fetch task ends, including by panic.
struct SettleGuard<V> {
    inner: Arc<Inner<V>>,
    key: String,
    id: u64,
}

impl<V> Drop for SettleGuard<V> {
    fn drop(&mut self) {
        self.inner.in_flight.settle(&self.key, self.id);
    }
}

/// Clears the processing flag if a drain pass is dropped mid-way.
struct ProcessingGuard<'a> {
    flag: &'a AtomicBool,
    held: bool,
}

impl ProcessingGuard<'_> {
    fn release(&mut self) {
        if self.held {
            self.flag.store(false, Ordering::Release);
            self.held = false;
        }
    }
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.release();
    }
}
