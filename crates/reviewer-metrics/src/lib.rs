//! A fire-and-forget metrics sink: a small `&mut dyn` interface the
//! dispatcher calls inline rather than a background collection loop.
//! Counters and histograms here are best-effort — a sink failing to emit
//! must never fail the dispatch it is reporting on.
//!
//! # Example
//!
//! ```
//! use reviewer_metrics::{MetricsSink, TracingMetricsSink};
//!
//! let mut sink = TracingMetricsSink;
//! sink.counter("reviews_success", 1, &[("repo", "acme/widgets")]);
//! sink.histogram("dispatch_duration_ms", 842.0, &[]);
//! ```

/// A tag attached to a metric emission: `(key, value)`.
pub type Tag<'a> = (&'a str, &'a str);

/// The seam between the dispatcher and whatever metrics backend a
/// deployment wires in. Implementations must not block or panic; a
/// metrics-sink failure is never allowed to fail the dispatch.
pub trait MetricsSink {
    fn counter(&mut self, name: &str, value: u64, tags: &[Tag<'_>]);
    fn histogram(&mut self, name: &str, value: f64, tags: &[Tag<'_>]);
}

/// Emits every metric as a structured `tracing` event at `info` level.
/// The only sink shipped here: a real deployment swaps in a StatsD/
/// CloudWatch-backed implementation without touching call sites.
pub struct TracingMetricsSink;

impl MetricsSink for TracingMetricsSink {
    fn counter(&mut self, name: &str, value: u64, tags: &[Tag<'_>]) {
        tracing::info!(metric.name = name, metric.kind = "counter", metric.value = value, metric.tags = ?tags, "metric");
    }

    fn histogram(&mut self, name: &str, value: f64, tags: &[Tag<'_>]) {
        tracing::info!(metric.name = name, metric.kind = "histogram", metric.value = value, metric.tags = ?tags, "metric");
    }
}

/// Discards every emission. Used by tests and dry-run invocations that
/// want to exercise the dispatch path without a live backend.
#[derive(Default)]
pub struct NoopMetricsSink;

impl MetricsSink for NoopMetricsSink {
    fn counter(&mut self, _name: &str, _value: u64, _tags: &[Tag<'_>]) {}
    fn histogram(&mut self, _name: &str, _value: f64, _tags: &[Tag<'_>]) {}
}

/// Records every emission in-memory, for assertions in tests that need to
/// check which metrics a code path emitted.
#[derive(Default)]
pub struct RecordingMetricsSink {
    pub counters: Vec<(String, u64)>,
    pub histograms: Vec<(String, f64)>,
}

impl MetricsSink for RecordingMetricsSink {
    fn counter(&mut self, name: &str, value: u64, _tags: &[Tag<'_>]) {
        self.counters.push((name.to_string(), value));
    }

    fn histogram(&mut self, name: &str, value: f64, _tags: &[Tag<'_>]) {
        self.histograms.push((name.to_string(), value));
    }
}
