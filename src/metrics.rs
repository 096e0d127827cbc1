//! Provider call metrics collection and reporting
//!
//! Tracks latency percentiles, success rate and failure kinds of the calls
//! the fetcher makes.

use crate::error::FailureKind;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::RwLock;

/// Maximum number of samples to keep for metrics calculation
const MAX_SAMPLES: usize = 100;

/// Metrics for the scheduler's provider
#[derive(Debug, Clone)]
pub struct ProviderMetrics {
    /// Name of the provider
    pub provider_name: String,
    /// 50th percentile latency of successful calls in milliseconds
    pub latency_p50_ms: f64,
    /// 99th percentile latency of successful calls in milliseconds
    pub latency_p99_ms: f64,
    /// Success rate (0.0 to 1.0)
    pub success_rate: f64,
    /// Total number of calls tracked
    pub total_requests: u64,
    /// Number of calls answered with fallback data
    pub failed_requests: u64,
    /// Failed calls among the last `MAX_SAMPLES` calls
    pub recent_failures: u64,
    /// Failed calls by kind
    pub failures_by_kind: HashMap<FailureKind, u64>,
    /// Outcome of the most recent call, `None` if it succeeded or none was made
    pub last_failure: Option<FailureKind>,
}

impl ProviderMetrics {
    /// Creates metrics with no data
    pub fn empty(provider_name: &str) -> Self {
        Self {
            provider_name: provider_name.to_string(),
            latency_p50_ms: 0.0,
            latency_p99_ms: 0.0,
            success_rate: 1.0,
            total_requests: 0,
            failed_requests: 0,
            recent_failures: 0,
            failures_by_kind: HashMap::new(),
            last_failure: None,
        }
    }
}

/// Internal sample for latency tracking
#[derive(Debug, Clone)]
struct LatencySample {
    duration_ms: f64,
    failure: Option<FailureKind>,
}

#[derive(Debug, Default)]
struct Totals {
    total: u64,
    failed: u64,
    by_kind: HashMap<FailureKind, u64>,
}

/// Collects and computes metrics for a provider
pub struct MetricsCollector {
    provider_name: String,
    /// Rolling window of latency samples
    samples: RwLock<VecDeque<LatencySample>>,
    /// Lifetime totals
    totals: RwLock<Totals>,
}

impl MetricsCollector {
    /// Creates a new metrics collector for a provider
    pub fn new(provider_name: &str) -> Self {
        Self {
            provider_name: provider_name.to_string(),
            samples: RwLock::new(VecDeque::with_capacity(MAX_SAMPLES)),
            totals: RwLock::new(Totals::default()),
        }
    }

    /// Records a call with its duration and failure kind, if any
    pub async fn record_request(&self, duration: Duration, failure: Option<FailureKind>) {
        let duration_ms = duration.as_secs_f64() * 1000.0;

        {
            let mut totals = self.totals.write().await;
            totals.total += 1;
            if let Some(kind) = failure {
                totals.failed += 1;
                *totals.by_kind.entry(kind).or_insert(0) += 1;
            }
        }

        let mut samples = self.samples.write().await;
        if samples.len() >= MAX_SAMPLES {
            samples.pop_front();
        }
        samples.push_back(LatencySample {
            duration_ms,
            failure,
        });
    }

    /// Computes current metrics from collected samples
    pub async fn get_metrics(&self) -> ProviderMetrics {
        let samples = self.samples.read().await;
        let totals = self.totals.read().await;

        if samples.is_empty() {
            return ProviderMetrics::empty(&self.provider_name);
        }

        let mut latencies: Vec<f64> = samples
            .iter()
            .filter(|s| s.failure.is_none())
            .map(|s| s.duration_ms)
            .collect();

        latencies.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let success_rate = if totals.total > 0 {
            (totals.total - totals.failed) as f64 / totals.total as f64
        } else {
            1.0
        };

        ProviderMetrics {
            provider_name: self.provider_name.clone(),
            latency_p50_ms: percentile(&latencies, 50.0),
            latency_p99_ms: percentile(&latencies, 99.0),
            success_rate,
            total_requests: totals.total,
            failed_requests: totals.failed,
            recent_failures: samples.iter().filter(|s| s.failure.is_some()).count() as u64,
            failures_by_kind: totals.by_kind.clone(),
            last_failure: samples.back().and_then(|s| s.failure),
        }
    }
}

/// Nearest-rank percentile of sorted values
fn percentile(sorted_values: &[f64], p: f64) -> f64 {
    if sorted_values.is_empty() {
        return 0.0;
    }

    let rank = (p / 100.0 * sorted_values.len() as f64).ceil() as usize;
    sorted_values[rank.clamp(1, sorted_values.len()) - 1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_metrics_collector() {
        let collector = MetricsCollector::new("test");

        collector.record_request(Duration::from_millis(100), None).await;
        collector.record_request(Duration::from_millis(200), None).await;
        collector
            .record_request(Duration::from_millis(150), Some(FailureKind::RateLimited))
            .await;

        let metrics = collector.get_metrics().await;

        assert_eq!(metrics.provider_name, "test");
        assert_eq!(metrics.total_requests, 3);
        assert_eq!(metrics.failed_requests, 1);
        assert_eq!(metrics.failures_by_kind[&FailureKind::RateLimited], 1);
        assert_eq!(metrics.last_failure, Some(FailureKind::RateLimited));
        assert_eq!(metrics.recent_failures, 1);
        assert!(metrics.success_rate > 0.6 && metrics.success_rate < 0.7);
        assert_eq!(metrics.latency_p99_ms, 200.0);
    }

    #[tokio::test]
    async fn test_recent_failures_age_out_of_the_window() {
        let collector = MetricsCollector::new("test");

        collector
            .record_request(Duration::from_millis(20), Some(FailureKind::Timeout))
            .await;
        collector.record_request(Duration::from_millis(10), None).await;

        let metrics = collector.get_metrics().await;
        assert_eq!(metrics.recent_failures, 1);
        assert!(metrics.last_failure.is_none());

        for _ in 0..MAX_SAMPLES {
            collector.record_request(Duration::from_millis(10), None).await;
        }

        let metrics = collector.get_metrics().await;
        assert_eq!(metrics.recent_failures, 0);
        assert_eq!(metrics.failed_requests, 1);
    }

    #[tokio::test]
    async fn test_empty_metrics() {
        let metrics = MetricsCollector::new("idle").get_metrics().await;
        assert_eq!(metrics.total_requests, 0);
        assert_eq!(metrics.success_rate, 1.0);
        assert!(metrics.last_failure.is_none());
        assert_eq!(metrics.recent_failures, 0);
    }

    #[test]
    fn test_percentile() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
        assert_eq!(percentile(&values, 50.0), 5.0);
        assert_eq!(percentile(&values, 99.0), 10.0);
    }
}
