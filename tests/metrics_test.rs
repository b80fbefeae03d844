//! Tests for metrics emitted by the optimizer.
//!
//! Uses `metrics_util::debugging::DebuggingRecorder` to capture and assert
//! on emitted metrics without needing a real exporter. Only caller-side
//! metrics are asserted: fetches run on spawned tasks, outside the local
//! recorder scope.

use metrics_util::MetricKind;
use metrics_util::debugging::{DebugValue, DebuggingRecorder};

use saddlery::telemetry;
use saddlery::{ApiOptimizer, QueuedCall};

// ============================================================================
// Snapshot type alias for readability
// ============================================================================

type SnapshotVec = Vec<(
    metrics_util::CompositeKey,
    Option<metrics::Unit>,
    Option<metrics::SharedString>,
    DebugValue,
)>;

// ============================================================================
// Helpers
// ============================================================================

/// Sum all counter values matching a given metric name.
fn counter_total(snapshot: &SnapshotVec, name: &str) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| key.kind() == MetricKind::Counter && key.key().name() == name)
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(v) => *v,
            _ => 0,
        })
        .sum()
}

/// Sum counter values for `name` whose `label` equals `value`.
fn counter_with_label(snapshot: &SnapshotVec, name: &str, label: &str, value: &str) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| {
            key.kind() == MetricKind::Counter
                && key.key().name() == name
                && key
                    .key()
                    .labels()
                    .any(|l| l.key() == label && l.value() == value)
        })
        .map(|(_, _, _, v)| match v {
            DebugValue::Counter(v) => *v,
            _ => 0,
        })
        .sum()
}

fn gauge_value(snapshot: &SnapshotVec, name: &str) -> Option<f64> {
    snapshot.iter().find_map(|(key, _, _, value)| match value {
        DebugValue::Gauge(v) if key.key().name() == name => Some(v.into_inner()),
        _ => None,
    })
}

// ============================================================================
// Tests
// ============================================================================

/// Runs async code within a local recorder scope on the multi-thread runtime.
///
/// `block_in_place` ensures the sync `with_local_recorder` closure stays
/// on the current thread while `block_on` drives the inner async work.
#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn lookups_record_hits_and_misses() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async {
                let optimizer: ApiOptimizer<u32> = ApiOptimizer::default();
                assert_eq!(optimizer.get_cache("a"), None);
                optimizer.set_cache("a", 1, None);
                assert_eq!(optimizer.get_cache("a"), Some(1));
                let value = optimizer
                    .batch_call("a", || async { Ok(2) }, None)
                    .await
                    .unwrap();
                assert_eq!(value, 1);
            })
        })
    });

    let snapshot = snapshotter.snapshot().into_vec();

    assert_eq!(counter_total(&snapshot, telemetry::CACHE_HITS_TOTAL), 2);
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_MISSES_TOTAL), 1);
    assert_eq!(
        counter_with_label(&snapshot, telemetry::CACHE_HITS_TOTAL, "source", "batch_call"),
        1
    );
    assert_eq!(
        counter_with_label(&snapshot, telemetry::CACHE_MISSES_TOTAL, "source", "get_cache"),
        1
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn joined_call_counts_as_coalesced() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async {
                let optimizer: ApiOptimizer<u32> = ApiOptimizer::default();
                let slow = || async {
                    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                    Ok(7)
                };
                let (a, b) = tokio::join!(
                    optimizer.batch_call("k", slow, None),
                    optimizer.batch_call("k", slow, None),
                );
                assert_eq!(a.unwrap(), b.unwrap());
            })
        })
    });

    let snapshot = snapshotter.snapshot().into_vec();

    assert_eq!(counter_total(&snapshot, telemetry::COALESCED_CALLS_TOTAL), 1);
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_MISSES_TOTAL), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn drain_pass_records_queue_metrics() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    let report = metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async {
                let optimizer: ApiOptimizer<u32> = ApiOptimizer::default();
                optimizer.set_cache("ready", 0, None);
                optimizer.queue_call(QueuedCall::new("ready", || async { Ok(1) }));
                optimizer.queue_call(
                    QueuedCall::new("waiting", || async { Ok(2) }).depends_on("missing"),
                );
                // Wait out any drain the queue spawned on its own.
                let mut report = optimizer.process_queue().await;
                while report.already_running {
                    tokio::task::yield_now().await;
                    report = optimizer.process_queue().await;
                }
                report
            })
        })
    });

    let snapshot = snapshotter.snapshot().into_vec();

    assert_eq!(report.blocked, 1);
    assert_eq!(gauge_value(&snapshot, telemetry::QUEUE_DEPTH), Some(1.0));
    assert!(counter_total(&snapshot, telemetry::QUEUE_BLOCKED_TOTAL) >= 1);
}

#[tokio::test]
async fn metrics_are_noop_without_recorder() {
    // Verify no panics when no recorder is installed.
    let optimizer: ApiOptimizer<u32> = ApiOptimizer::default();
    let value = optimizer
        .batch_call("k", || async { Ok(3) }, None)
        .await
        .unwrap();
    assert_eq!(value, 3);
}
