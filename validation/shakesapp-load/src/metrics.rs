//! Metrics collection and statistics.

use crate::config::TestConfig;
use crate::error::RequestFailure;
use hdrhistogram::Histogram;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Outcome metrics for one virtual user.
///
/// Each user owns its collector; the driver merges them after the run.
#[derive(Debug, Clone)]
pub struct MetricsCollector {
    histogram: Histogram<u64>,
    requests_success: u64,
    requests_failed: u64,
    requests_abandoned: u64,
    failures: BTreeMap<String, u64>,
    status_codes: BTreeMap<u16, u64>,
    bytes_total: u64,
}

impl MetricsCollector {
    /// Create a new metrics collector.
    pub fn new() -> Self {
        Self {
            histogram: Histogram::new(3).expect("Failed to create histogram"),
            requests_success: 0,
            requests_failed: 0,
            requests_abandoned: 0,
            failures: BTreeMap::new(),
            status_codes: BTreeMap::new(),
            bytes_total: 0,
        }
    }

    /// Record a successful request.
    pub fn record_success(&mut self, latency_us: u64, status: u16, bytes: usize) {
        self.requests_success += 1;
        self.bytes_total += bytes as u64;
        self.histogram.record(latency_us).ok();
        *self.status_codes.entry(status).or_default() += 1;
    }

    /// Record a failed request.
    pub fn record_failure(&mut self, failure: &RequestFailure) {
        self.requests_failed += 1;
        *self.failures.entry(failure.kind().to_string()).or_default() += 1;
        if let RequestFailure::Status(status) = failure {
            *self.status_codes.entry(*status).or_default() += 1;
        }
    }

    /// Record a request cut off by the test deadline.
    pub fn record_abandoned(&mut self) {
        self.requests_abandoned += 1;
    }

    /// Completed requests, successful or not.
    pub fn requests_total(&self) -> u64 {
        self.requests_success + self.requests_failed
    }

    pub fn requests_failed(&self) -> u64 {
        self.requests_failed
    }

    /// Fold another user's metrics into this one.
    pub fn merge(&mut self, other: &MetricsCollector) {
        self.histogram.add(&other.histogram).ok();
        self.requests_success += other.requests_success;
        self.requests_failed += other.requests_failed;
        self.requests_abandoned += other.requests_abandoned;
        self.bytes_total += other.bytes_total;
        for (kind, count) in &other.failures {
            *self.failures.entry(kind.clone()).or_default() += count;
        }
        for (status, count) in &other.status_codes {
            *self.status_codes.entry(*status).or_default() += count;
        }
    }

    /// Generate the final aggregate report.
    pub fn results(
        &self,
        config: &TestConfig,
        active_users: u32,
        term_counts: BTreeMap<String, u64>,
        elapsed: Duration,
    ) -> AggregateReport {
        let duration_secs = elapsed.as_secs_f64();
        let total_requests = self.requests_total();
        let per_second = |value: u64| {
            if duration_secs > 0.0 {
                value as f64 / duration_secs
            } else {
                0.0
            }
        };

        AggregateReport {
            timestamp: chrono::Utc::now().to_rfc3339(),
            scenario_name: config.name.clone(),
            target_endpoint: config.target_endpoint.clone(),
            duration_secs,
            configured_concurrency: config.concurrency,
            active_users,
            lost_users: 0,
            total_requests,
            successful_requests: self.requests_success,
            failed_requests: self.requests_failed,
            abandoned_requests: self.requests_abandoned,
            requests_per_second: per_second(total_requests),
            latency_p50: self.histogram.value_at_percentile(50.0) as f64 / 1000.0,
            latency_p90: self.histogram.value_at_percentile(90.0) as f64 / 1000.0,
            latency_p95: self.histogram.value_at_percentile(95.0) as f64 / 1000.0,
            latency_p99: self.histogram.value_at_percentile(99.0) as f64 / 1000.0,
            latency_min: self.histogram.min() as f64 / 1000.0,
            latency_max: self.histogram.max() as f64 / 1000.0,
            latency_avg: self.histogram.mean() / 1000.0,
            bytes_per_second: per_second(self.bytes_total),
            failures_by_kind: self.failures.clone(),
            status_codes: self.status_codes.clone(),
            term_counts,
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// End-of-test summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateReport {
    pub timestamp: String,
    pub scenario_name: String,
    pub target_endpoint: String,
    /// Observed wall-clock duration.
    pub duration_secs: f64,
    pub configured_concurrency: u32,
    /// Users that actually started; lower than configured on degraded startup.
    pub active_users: u32,
    /// Users that panicked or were aborted; their outcomes are missing from
    /// the totals while their term counts remain.
    #[serde(default)]
    pub lost_users: u32,

    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub abandoned_requests: u64,
    pub requests_per_second: f64,

    // Latency percentiles (ms), successful requests only
    pub latency_p50: f64,
    pub latency_p90: f64,
    pub latency_p95: f64,
    pub latency_p99: f64,
    pub latency_min: f64,
    pub latency_max: f64,
    pub latency_avg: f64,

    pub bytes_per_second: f64,

    pub failures_by_kind: BTreeMap<String, u64>,
    pub status_codes: BTreeMap<u16, u64>,

    /// Requests per vocabulary term.
    pub term_counts: BTreeMap<String, u64>,
}

impl AggregateReport {
    /// Percentage of completed requests that succeeded.
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        self.successful_requests as f64 / self.total_requests as f64 * 100.0
    }

    /// Fewer users started than were configured.
    pub fn is_degraded(&self) -> bool {
        self.active_users < self.configured_concurrency
    }
}
