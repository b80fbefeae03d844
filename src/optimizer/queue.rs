//! Priority call queue with dependency gating.
//!
//! The queue itself is plain data: it orders calls and decides which one a
//! drain pass should run next. Executing calls, and deciding whether a
//! dependency key is satisfied, belong to the
//! [`ApiOptimizer`](super::ApiOptimizer).

use std::fmt;
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde::Deserialize;

use crate::Result;

/// Boxed fetch future produced by a queued call.
pub type CallFuture<V> = BoxFuture<'static, Result<V>>;

/// Deferred fetch: invoked at most once, when the call is executed.
pub type CallThunk<V> = Box<dyn FnOnce() -> CallFuture<V> + Send>;

/// Execution priority of a queued call. `High` drains first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a drain pass does when the best-ranked call has unmet dependencies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DependencyPolicy {
    /// Leave blocked calls where they are and run the highest-priority call
    /// that is ready. The pass ends when no queued call is ready.
    #[default]
    SkipAndContinue,
    /// Move the blocked call to the tail and end the pass. Independent calls
    /// behind it wait until the queue is triggered again.
    StopOnUnmet,
}

/// A call waiting in the queue.
///
/// ```rust
/// # use saddlery::{Priority, QueuedCall};
/// let call = QueuedCall::new("products", || async { Ok(42u32) })
///     .priority(Priority::High)
///     .depends_on("categories");
/// assert_eq!(call.key(), "products");
/// ```
pub struct QueuedCall<V> {
    key: String,
    fetch: CallThunk<V>,
    dependencies: Vec<String>,
    priority: Priority,
    ttl: Option<Duration>,
}

impl<V: 'static> QueuedCall<V> {
    /// Queue `fetch` under `key` with medium priority and no dependencies.
    pub fn new<F, Fut>(key: impl Into<String>, fetch: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        Self {
            key: key.into(),
            fetch: Box::new(move || fetch().boxed()),
            dependencies: Vec::new(),
            priority: Priority::default(),
            ttl: None,
        }
    }
}

impl<V> QueuedCall<V> {
    /// Set the priority.
    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Require `key` to be cached before this call may run.
    pub fn depends_on(mut self, key: impl Into<String>) -> Self {
        self.dependencies.push(key.into());
        self
    }

    /// Cache the result with this TTL instead of the optimizer default.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub(crate) fn into_parts(self) -> (String, CallThunk<V>, Priority, Option<Duration>) {
        (self.key, self.fetch, self.priority, self.ttl)
    }
}

impl<V> fmt::Debug for QueuedCall<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueuedCall")
            .field("key", &self.key)
            .field("dependencies", &self.dependencies)
            .field("priority", &self.priority)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

/// Outcome of asking the queue for its next call.
pub(crate) enum Next<V> {
    Ready(QueuedCall<V>),
    Blocked,
    Empty,
}

/// Ordered list of pending calls.
pub(crate) struct CallQueue<V> {
    calls: Vec<QueuedCall<V>>,
}

impl<V> CallQueue<V> {
    pub(crate) fn new() -> Self {
        Self { calls: Vec::new() }
    }

    pub(crate) fn push(&mut self, call: QueuedCall<V>) {
        self.calls.push(call);
    }

    pub(crate) fn len(&self) -> usize {
        self.calls.len()
    }

    pub(crate) fn clear(&mut self) {
        self.calls.clear();
    }

    pub(crate) fn keys(&self) -> Vec<String> {
        self.calls.iter().map(|c| c.key.clone()).collect()
    }

    /// Number of queued calls for which `is_ready` is false.
    pub(crate) fn count_unready(&self, is_ready: impl Fn(&QueuedCall<V>) -> bool) -> usize {
        self.calls.iter().filter(|call| !is_ready(call)).count()
    }

    /// Pick the next call to run.
    ///
    /// Calls are stable-sorted by descending priority first, so calls of
    /// equal priority keep their insertion order.
    pub(crate) fn take_next(
        &mut self,
        policy: DependencyPolicy,
        is_ready: impl Fn(&QueuedCall<V>) -> bool,
    ) -> Next<V> {
        if self.calls.is_empty() {
            return Next::Empty;
        }
        self.calls.sort_by(|a, b| b.priority.cmp(&a.priority));

        match policy {
            DependencyPolicy::SkipAndContinue => match self.calls.iter().position(is_ready) {
                Some(idx) => Next::Ready(self.calls.remove(idx)),
                None => Next::Blocked,
            },
            DependencyPolicy::StopOnUnmet => {
                let head = self.calls.remove(0);
                if is_ready(&head) {
                    Next::Ready(head)
                } else {
                    self.calls.push(head);
                    Next::Blocked
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(key: &str, priority: Priority) -> QueuedCall<u32> {
        QueuedCall::new(key, || async { Ok(0) }).priority(priority)
    }

    fn drain_keys(queue: &mut CallQueue<u32>, policy: DependencyPolicy) -> Vec<String> {
        let mut order = Vec::new();
        while let Next::Ready(call) = queue.take_next(policy, |c| c.dependencies().is_empty()) {
            order.push(call.key().to_string());
        }
        order
    }

    #[test]
    fn priority_ordering() {
        assert!(Priority::High > Priority::Medium);
        assert!(Priority::Medium > Priority::Low);
        assert_eq!(Priority::default(), Priority::Medium);
    }

    #[test]
    fn drains_by_priority() {
        let mut queue = CallQueue::new();
        queue.push(call("low", Priority::Low));
        queue.push(call("high", Priority::High));
        queue.push(call("medium", Priority::Medium));

        let order = drain_keys(&mut queue, DependencyPolicy::SkipAndContinue);
        assert_eq!(order, ["high", "medium", "low"]);
    }

    #[test]
    fn equal_priority_keeps_insertion_order() {
        let mut queue = CallQueue::new();
        queue.push(call("a", Priority::Low));
        queue.push(call("b", Priority::Low));
        queue.push(call("c", Priority::Low));

        let order = drain_keys(&mut queue, DependencyPolicy::StopOnUnmet);
        assert_eq!(order, ["a", "b", "c"]);
    }

    #[test]
    fn skip_policy_runs_ready_call_behind_blocked_one() {
        let mut queue = CallQueue::new();
        queue.push(call("blocked", Priority::High).depends_on("missing"));
        queue.push(call("free", Priority::Low));

        let order = drain_keys(&mut queue, DependencyPolicy::SkipAndContinue);
        assert_eq!(order, ["free"]);
        assert_eq!(queue.keys(), ["blocked"]);
    }

    #[test]
    fn stop_policy_requeues_blocked_call_at_tail() {
        let mut queue = CallQueue::new();
        queue.push(call("blocked", Priority::High).depends_on("missing"));
        queue.push(call("free", Priority::Low));

        let order = drain_keys(&mut queue, DependencyPolicy::StopOnUnmet);
        assert!(order.is_empty());
        assert_eq!(queue.keys(), ["free", "blocked"]);
        assert_eq!(queue.count_unready(|c| c.dependencies().is_empty()), 1);
    }

    #[test]
    fn empty_queue() {
        let mut queue: CallQueue<u32> = CallQueue::new();
        assert!(matches!(
            queue.take_next(DependencyPolicy::SkipAndContinue, |_| true),
            Next::Empty
        ));
    }

    #[test]
    fn policy_deserializes_kebab_case() {
        #[derive(Deserialize)]
        struct Wrapper {
            policy: DependencyPolicy,
        }
        let w: Wrapper = toml::from_str(r#"policy = "stop-on-unmet""#).unwrap();
        assert_eq!(w.policy, DependencyPolicy::StopOnUnmet);
    }
}
