//! Tests for metrics integration.
//!
//! Uses `metrics_util::debugging::DebuggingRecorder` to capture and assert
//! on emitted counters without needing a real exporter.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use metrics_util::MetricKind;
use metrics_util::debugging::{DebugValue, DebuggingRecorder};
use tempfile::TempDir;

use muninn::{
    CacheConfig, Muninn, RequestOptions, Response, RetryConfig, Transport, TransportError,
    TransportRequest, telemetry,
};

// ============================================================================
// Mock transports
// ============================================================================

/// Answers 200 after a configurable number of 503s.
struct FlakyTransport {
    failures_left: Mutex<u32>,
}

impl FlakyTransport {
    fn new(failures: u32) -> Arc<Self> {
        Arc::new(Self {
            failures_left: Mutex::new(failures),
        })
    }
}

#[async_trait]
impl Transport for FlakyTransport {
    async fn execute(&self, request: TransportRequest) -> Result<Response, TransportError> {
        let mut left = self.failures_left.lock().unwrap();
        let status = if *left > 0 {
            *left -= 1;
            503
        } else {
            200
        };
        Ok(Response {
            url: request.url.to_string(),
            status,
            reason: None,
            headers: Default::default(),
            body: b"body".to_vec(),
            from_cache: false,
        })
    }
}

// ============================================================================
// Snapshot type alias for readability
// ============================================================================

type SnapshotVec = Vec<(
    metrics_util::CompositeKey,
    Option<metrics::Unit>,
    Option<metrics::SharedString>,
    DebugValue,
)>;

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

fn fast_retry(max_retries: u32) -> RetryConfig {
    RetryConfig::new()
        .max_retries(max_retries)
        .initial_delay(Duration::from_millis(1))
        .jitter(false)
}

// ============================================================================
// Tests
// ============================================================================

/// Runs async code within a local recorder scope on the multi-thread runtime.
///
/// `block_in_place` ensures the sync `with_local_recorder` closure stays
/// on the current thread while `block_on` drives the inner async work.
#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn successful_request_records_counters() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    let result = metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async {
                let client = Muninn::builder()
                    .transport(FlakyTransport::new(0))
                    .build()
                    .unwrap();
                client.get("https://example.com/", RequestOptions::new()).await
            })
        })
    });
    assert!(result.is_ok());

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(counter_total(&snapshot, telemetry::REQUESTS_TOTAL), 1);
    assert_eq!(counter_total(&snapshot, telemetry::RETRIES_TOTAL), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn retried_request_records_retry_counters() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    let result = metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async {
                let client = Muninn::builder()
                    .retry(fast_retry(3))
                    .transport(FlakyTransport::new(2))
                    .build()
                    .unwrap();
                client.get("https://example.com/", RequestOptions::new()).await
            })
        })
    });
    assert!(result.is_ok());

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(counter_total(&snapshot, telemetry::RETRIES_TOTAL), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn cache_hit_and_miss_record_counters() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    let tmp = TempDir::new().unwrap();

    let result = metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async {
                let client = Muninn::builder()
                    .cache(
                        CacheConfig::new()
                            .enabled(true)
                            .dir(tmp.path().join("httpcache")),
                    )
                    .transport(FlakyTransport::new(0))
                    .build()
                    .unwrap();
                client
                    .get("https://example.com/", RequestOptions::new())
                    .await?;
                client.get("https://example.com/", RequestOptions::new()).await
            })
        })
    });
    assert!(result.unwrap().from_cache);

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_MISSES_TOTAL), 1);
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_STORES_TOTAL), 1);
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_HITS_TOTAL), 1);
    // The cache hit short-circuits the second transport dispatch.
    assert_eq!(counter_total(&snapshot, telemetry::REQUESTS_TOTAL), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn corrupt_cache_read_records_error_counter() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    let tmp = TempDir::new().unwrap();
    let cache_dir = tmp.path().join("httpcache");

    let result = metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async {
                let client = Muninn::builder()
                    .cache(CacheConfig::new().enabled(true).dir(&cache_dir))
                    .transport(FlakyTransport::new(0))
                    .build()
                    .unwrap();
                client
                    .get("https://example.com/", RequestOptions::new())
                    .await?;
                for entry in std::fs::read_dir(&cache_dir).unwrap() {
                    std::fs::write(entry.unwrap().path().join("meta"), b"not json").unwrap();
                }
                client.get("https://example.com/", RequestOptions::new()).await
            })
        })
    });
    assert!(!result.unwrap().from_cache);

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_ERRORS_TOTAL), 1);
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_HITS_TOTAL), 0);
}

#[tokio::test]
async fn metrics_are_noop_without_recorder() {
    // Verify no panics when no recorder is installed.
    let client = Muninn::builder()
        .transport(FlakyTransport::new(0))
        .build()
        .unwrap();
    let response = client
        .get("https://example.com/", RequestOptions::new())
        .await
        .unwrap();
    assert!(response.is_success());
}
