//! Telemetry metric name constants.
//!
//! Centralised metric names for saddlery operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `saddlery_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `source`: where a cache lookup came from: "get_cache" or "batch_call"
//! - `status`: outcome: "ok" or "error"
//! - `priority`: queued call priority: "high", "medium" or "low"
//! - `method`: HTTP method

/// Total cache hits.
///
/// Labels: `source`.
pub const CACHE_HITS_TOTAL: &str = "saddlery_cache_hits_total";

/// Total cache misses (including reads that found an expired entry).
///
/// Labels: `source`.
pub const CACHE_MISSES_TOTAL: &str = "saddlery_cache_misses_total";

/// Calls that joined an identical in-flight call instead of fetching.
pub const COALESCED_CALLS_TOTAL: &str = "saddlery_coalesced_calls_total";

/// Underlying fetches issued by the optimizer.
///
/// Labels: `status` ("ok" | "error").
pub const FETCHES_TOTAL: &str = "saddlery_fetches_total";

/// Queued calls executed by a drain pass.
///
/// Labels: `priority`, `status`.
pub const QUEUE_EXECUTIONS_TOTAL: &str = "saddlery_queue_executions_total";

/// Drain passes that ended with calls still blocked on dependencies.
pub const QUEUE_BLOCKED_TOTAL: &str = "saddlery_queue_blocked_total";

/// Current number of queued calls.
pub const QUEUE_DEPTH: &str = "saddlery_queue_depth";

/// Total retry attempts (not counting the initial request).
///
/// Labels: `operation`.
pub const RETRIES_TOTAL: &str = "saddlery_retries_total";

/// HTTP request duration in seconds.
///
/// Labels: `method`, `status`.
pub const REQUEST_DURATION_SECONDS: &str = "saddlery_request_duration_seconds";
