//! Driver tests against a scripted transport.
//!
//! These run on tokio's paused clock, so multi-second scenarios finish
//! instantly and iteration counts are exact.

use async_trait::async_trait;
use shakesapp_load::{
    ConfigError, LoadRunner, RequestFailure, Response, TestConfig, Transport, TransportFactory,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

// ============================================================================
// Scripted transport
// ============================================================================

struct ScriptedTransport {
    latency: Duration,
    /// 1-based call numbers that fail with HTTP 500.
    fail_on: Vec<u64>,
    /// 1-based call number that panics the user task.
    panic_on: Option<u64>,
    calls: AtomicU64,
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, url: &Url) -> Result<Response, RequestFailure> {
        assert!(url.query_pairs().any(|(k, _)| k == "q"));
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.latency).await;
        if self.panic_on == Some(call) {
            panic!("transport blew up on call {}", call);
        }
        if self.fail_on.contains(&call) {
            Err(RequestFailure::Status(500))
        } else {
            Ok(Response {
                status: 200,
                bytes: 32,
            })
        }
    }
}

#[derive(Default)]
struct ScriptedFactory {
    latency: Duration,
    fail_on: HashMap<usize, Vec<u64>>,
    panic_on: HashMap<usize, u64>,
    broken_users: Vec<usize>,
    created: Arc<AtomicUsize>,
}

impl ScriptedFactory {
    fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Default::default()
        }
    }
}

impl TransportFactory for ScriptedFactory {
    fn create(&self, user_id: usize) -> anyhow::Result<Arc<dyn Transport>> {
        if self.broken_users.contains(&user_id) {
            anyhow::bail!("no route to host for user {}", user_id);
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(ScriptedTransport {
            latency: self.latency,
            fail_on: self.fail_on.get(&user_id).cloned().unwrap_or_default(),
            panic_on: self.panic_on.get(&user_id).copied(),
            calls: AtomicU64::new(0),
        }))
    }
}

fn config(concurrency: u32, duration_secs: u64, delay_ms: u64, vocabulary: &[&str]) -> TestConfig {
    TestConfig {
        name: "scripted".to_string(),
        target_endpoint: "http://shakesapp.test".to_string(),
        concurrency,
        duration_secs,
        delay_ms,
        vocabulary: vocabulary.iter().map(|w| w.to_string()).collect(),
        seed: Some(42),
        ..Default::default()
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_two_users_three_seconds() {
    let runner = LoadRunner::with_transport(
        config(2, 3, 1000, &["hello", "love"]),
        ScriptedFactory::with_latency(Duration::from_millis(10)),
    )
    .unwrap();

    let report = runner.run().await.unwrap();

    // Each user requests at 0s, 1.01s and 2.02s.
    assert_eq!(report.total_requests, 6);
    assert_eq!(report.successful_requests, 6);
    assert_eq!(report.active_users, 2);
    assert_eq!(report.term_counts.len(), 2);
    assert_eq!(
        report.term_counts["hello"] + report.term_counts["love"],
        report.total_requests
    );
}

#[tokio::test(start_paused = true)]
async fn test_counter_matches_outcomes_under_load() {
    let vocabulary = ["hello", "love", "life", "people", "cloud", "sun", "rainbow", "beauty"];
    let runner = LoadRunner::with_transport(
        config(60, 20, 50, &vocabulary),
        ScriptedFactory::with_latency(Duration::from_millis(7)),
    )
    .unwrap();

    let report = runner.run().await.unwrap();

    let counted: u64 = report.term_counts.values().sum();
    assert_eq!(counted, report.total_requests);
    assert_eq!(
        report.total_requests,
        report.successful_requests + report.failed_requests
    );
    assert!(report.total_requests > 60 * 300);
}

// ============================================================================
// Deadline
// ============================================================================

async fn assert_finishes_on_time(duration_secs: u64) {
    let config = config(8, duration_secs, 250, &["hello", "love"]);
    let grace = config.shutdown_grace();
    let runner =
        LoadRunner::with_transport(config, ScriptedFactory::with_latency(Duration::from_millis(40)))
            .unwrap();

    let start = Instant::now();
    let report = runner.run().await.unwrap();
    let elapsed = start.elapsed();

    assert!(elapsed >= Duration::from_secs(duration_secs));
    assert!(elapsed <= Duration::from_secs(duration_secs) + grace);
    assert!(report.duration_secs <= (Duration::from_secs(duration_secs) + grace).as_secs_f64());
}

#[tokio::test(start_paused = true)]
async fn test_one_second_run_stops_at_deadline() {
    assert_finishes_on_time(1).await;
}

#[tokio::test(start_paused = true)]
async fn test_five_second_run_stops_at_deadline() {
    assert_finishes_on_time(5).await;
}

#[tokio::test(start_paused = true)]
async fn test_hung_requests_are_abandoned_at_deadline() {
    let runner = LoadRunner::with_transport(
        config(4, 2, 1000, &["hello"]),
        ScriptedFactory::with_latency(Duration::from_secs(3600)),
    )
    .unwrap();

    let start = Instant::now();
    let report = runner.run().await.unwrap();

    assert!(start.elapsed() < Duration::from_millis(2100));
    assert_eq!(report.total_requests, 0);
    assert_eq!(report.abandoned_requests, 4);
    assert_eq!(report.term_counts["hello"], 0);
}

// ============================================================================
// Isolation
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_injected_failures_are_counted_once_each() {
    let factory = ScriptedFactory {
        latency: Duration::from_millis(10),
        fail_on: HashMap::from([(0, vec![2, 5, 7])]),
        ..Default::default()
    };
    let runner = LoadRunner::with_transport(config(4, 10, 1000, &["hello", "love"]), factory).unwrap();

    let report = runner.run().await.unwrap();

    // Ten iterations per user: 0s, 1.01s, ... 9.09s.
    assert_eq!(report.total_requests, 40);
    assert_eq!(report.failed_requests, 3);
    assert_eq!(report.successful_requests, 37);
    assert_eq!(report.failures_by_kind["status"], 3);
    assert_eq!(report.status_codes[&500], 3);
    assert_eq!(report.term_counts.values().sum::<u64>(), 40);
}

#[tokio::test(start_paused = true)]
async fn test_failing_user_keeps_running() {
    let factory = ScriptedFactory {
        latency: Duration::from_millis(10),
        fail_on: HashMap::from([(1, (1..=100).collect())]),
        ..Default::default()
    };
    let runner = LoadRunner::with_transport(config(2, 5, 1000, &["hello"]), factory).unwrap();

    let report = runner.run().await.unwrap();

    assert_eq!(report.failed_requests, 5);
    assert_eq!(report.successful_requests, 5);
}

#[tokio::test(start_paused = true)]
async fn test_panicked_user_is_reported_as_lost() {
    let factory = ScriptedFactory {
        latency: Duration::from_millis(10),
        panic_on: HashMap::from([(0, 3)]),
        ..Default::default()
    };
    let runner = LoadRunner::with_transport(config(2, 5, 1000, &["hello", "love"]), factory).unwrap();

    let report = runner.run().await.unwrap();

    // User 1 finishes its five iterations; user 0's metrics go down with it.
    assert_eq!(report.lost_users, 1);
    assert_eq!(report.active_users, 2);
    assert_eq!(report.total_requests, 5);
    assert_eq!(report.successful_requests, 5);
    // User 0 counted its first two terms before the panic.
    assert_eq!(
        report.term_counts.values().sum::<u64>(),
        report.total_requests + 2
    );
}

#[tokio::test(start_paused = true)]
async fn test_clean_run_loses_no_users() {
    let runner = LoadRunner::with_transport(
        config(3, 2, 500, &["hello"]),
        ScriptedFactory::with_latency(Duration::from_millis(10)),
    )
    .unwrap();

    let report = runner.run().await.unwrap();

    assert_eq!(report.lost_users, 0);
    assert_eq!(report.term_counts["hello"], report.total_requests);
}

// ============================================================================
// Startup
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_degraded_startup_runs_remaining_users() {
    let factory = ScriptedFactory {
        latency: Duration::from_millis(10),
        broken_users: vec![1],
        ..Default::default()
    };
    let runner = LoadRunner::with_transport(config(4, 3, 1000, &["hello", "love"]), factory).unwrap();

    let report = runner.run().await.unwrap();

    assert_eq!(report.configured_concurrency, 4);
    assert_eq!(report.active_users, 3);
    assert!(report.is_degraded());
    assert_eq!(report.total_requests, 9);
}

#[tokio::test(start_paused = true)]
async fn test_no_users_started_is_an_error() {
    let factory = ScriptedFactory {
        broken_users: vec![0, 1],
        ..Default::default()
    };
    let runner = LoadRunner::with_transport(config(2, 3, 1000, &["hello"]), factory).unwrap();

    assert!(runner.run().await.is_err());
}

#[test]
fn test_empty_vocabulary_never_starts() {
    let factory = ScriptedFactory::default();
    let created = factory.created.clone();

    let err = LoadRunner::with_transport(config(2, 3, 1000, &[]), factory)
        .err()
        .expect("empty vocabulary accepted");

    assert!(matches!(err, ConfigError::EmptyVocabulary));
    assert_eq!(created.load(Ordering::SeqCst), 0);
}

#[test]
fn test_invalid_endpoint_never_starts() {
    let mut config = config(2, 3, 1000, &["hello"]);
    config.target_endpoint = "shakesapp without scheme".to_string();

    let err = LoadRunner::with_transport(config, ScriptedFactory::default())
        .err()
        .expect("invalid endpoint accepted");
    assert!(matches!(err, ConfigError::InvalidEndpoint { .. }));
}

// ============================================================================
// Reproducibility
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_seeded_runs_choose_the_same_terms() {
    let vocabulary = ["hello", "love", "life", "people", "cloud", "sun", "rainbow", "beauty"];

    let mut counts = Vec::new();
    for _ in 0..2 {
        let runner = LoadRunner::with_transport(
            config(5, 30, 500, &vocabulary),
            ScriptedFactory::with_latency(Duration::from_millis(10)),
        )
        .unwrap();
        counts.push(runner.run().await.unwrap().term_counts);
    }

    assert_eq!(counts[0], counts[1]);
}
