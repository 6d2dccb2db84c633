//! Metrics collection and export module

use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use std::time::Instant;

/// Global metrics registry
pub struct Metrics {
    registry: Registry,

    // Counters
    pub builds_total: IntCounter,
    pub builds_failed: IntCounterVec,
    pub executions_total: IntCounter,
    pub executions_success: IntCounter,
    pub executions_failed_status: IntCounter,
    pub submission_errors: IntCounterVec,
    pub cache_resets: IntCounter,
    pub names_resolved: IntCounter,
    pub objects_fetched: IntCounter,
    pub inclusion_polls: IntCounter,
    pub inclusion_poll_errors: IntCounter,

    // Gauges
    pub executor_queue_depth: IntGauge,
    pub cache_entries: IntGauge,

    // Histograms
    pub build_latency: Histogram,
    pub execute_latency: Histogram,
    pub inclusion_wait: Histogram,
}

impl Metrics {
    /// Create new metrics instance
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let builds_total =
            IntCounter::with_opts(Opts::new("builds_total", "Transaction builds attempted"))?;

        let builds_failed = IntCounterVec::new(
            Opts::new("builds_failed_total", "Failed builds by error category"),
            &["category"],
        )?;

        let executions_total = IntCounter::with_opts(Opts::new(
            "executions_total",
            "Transactions handed to the ledger",
        ))?;

        let executions_success = IntCounter::with_opts(Opts::new(
            "executions_success_total",
            "Executions whose effects report success",
        ))?;

        let executions_failed_status = IntCounter::with_opts(Opts::new(
            "executions_failed_status_total",
            "Executions whose effects report an execution failure",
        ))?;

        let submission_errors = IntCounterVec::new(
            Opts::new("submission_errors_total", "Executor errors by category"),
            &["category"],
        )?;

        let cache_resets = IntCounter::with_opts(Opts::new(
            "cache_resets_total",
            "Object cache resets after a failed execution",
        ))?;

        let names_resolved = IntCounter::with_opts(Opts::new(
            "names_resolved_total",
            "Named packages resolved through the lookup client",
        ))?;

        let objects_fetched = IntCounter::with_opts(Opts::new(
            "objects_fetched_total",
            "Objects fetched through the lookup client",
        ))?;

        let inclusion_polls =
            IntCounter::with_opts(Opts::new("inclusion_polls_total", "Inclusion poll attempts"))?;

        let inclusion_poll_errors = IntCounter::with_opts(Opts::new(
            "inclusion_poll_errors_total",
            "Transient errors while polling for inclusion",
        ))?;

        let executor_queue_depth = IntGauge::with_opts(Opts::new(
            "executor_queue_depth",
            "Operations waiting on or holding the serial executor",
        ))?;

        let cache_entries =
            IntGauge::with_opts(Opts::new("cache_entries", "Entries in the object cache"))?;

        let build_latency = Histogram::with_opts(
            HistogramOpts::new("build_latency_seconds", "Transaction build latency")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        )?;

        let execute_latency = Histogram::with_opts(
            HistogramOpts::new("execute_latency_seconds", "Sign, submit and apply latency")
                .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0]),
        )?;

        let inclusion_wait = Histogram::with_opts(
            HistogramOpts::new("inclusion_wait_seconds", "Time until a transaction was found")
                .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
        )?;

        // Register all metrics
        registry.register(Box::new(builds_total.clone()))?;
        registry.register(Box::new(builds_failed.clone()))?;
        registry.register(Box::new(executions_total.clone()))?;
        registry.register(Box::new(executions_success.clone()))?;
        registry.register(Box::new(executions_failed_status.clone()))?;
        registry.register(Box::new(submission_errors.clone()))?;
        registry.register(Box::new(cache_resets.clone()))?;
        registry.register(Box::new(names_resolved.clone()))?;
        registry.register(Box::new(objects_fetched.clone()))?;
        registry.register(Box::new(inclusion_polls.clone()))?;
        registry.register(Box::new(inclusion_poll_errors.clone()))?;
        registry.register(Box::new(executor_queue_depth.clone()))?;
        registry.register(Box::new(cache_entries.clone()))?;
        registry.register(Box::new(build_latency.clone()))?;
        registry.register(Box::new(execute_latency.clone()))?;
        registry.register(Box::new(inclusion_wait.clone()))?;

        Ok(Self {
            registry,
            builds_total,
            builds_failed,
            executions_total,
            executions_success,
            executions_failed_status,
            submission_errors,
            cache_resets,
            names_resolved,
            objects_fetched,
            inclusion_polls,
            inclusion_poll_errors,
            executor_queue_depth,
            cache_entries,
            build_latency,
            execute_latency,
            inclusion_wait,
        })
    }

    /// Get the registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_build_failure(&self, category: &str) {
        self.builds_failed.with_label_values(&[category]).inc();
    }

    pub fn record_submission_error(&self, category: &str) {
        self.submission_errors.with_label_values(&[category]).inc();
    }
}

/// Global metrics instance
pub fn metrics() -> &'static Metrics {
    static METRICS: once_cell::sync::Lazy<Metrics> =
        once_cell::sync::Lazy::new(|| Metrics::new().expect("Failed to initialize metrics"));
    &METRICS
}

/// Timer helper for measuring operation duration
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn observe_duration(&self, histogram: &Histogram) {
        histogram.observe(self.elapsed_secs());
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_register_without_conflicts() {
        let m = Metrics::new().unwrap();
        m.builds_total.inc();
        m.record_build_failure("gas");
        m.record_build_failure("gas");
        assert_eq!(m.builds_total.get(), 1);
        assert_eq!(m.builds_failed.with_label_values(&["gas"]).get(), 2);
        assert!(!m.registry().gather().is_empty());
    }

    #[test]
    fn test_timer_observes() {
        let m = Metrics::new().unwrap();
        let timer = Timer::new();
        timer.observe_duration(&m.build_latency);
        assert_eq!(m.build_latency.get_sample_count(), 1);
    }
}
