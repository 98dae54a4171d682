//! # Run Metrics
//!
//! Cross-VU metric aggregation. A single [`MetricsRegistry`] is shared (behind an `Arc`) by
//! every virtual user; recording never blocks other recorders for long and never loses an
//! update. [`MetricsRegistry::snapshot`] can be taken at any time, mid-run included.

pub mod trend;

pub use trend::{percentile, Trend, TrendSummary};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use surge_publisher::SendResult;
use tracing::warn;

/// Stable metric names.
pub mod names {
    /// Messages acknowledged by the broker
    pub const MESSAGES_SENT: &str = "kafka_messages_sent";
    /// Messages whose produce call failed
    pub const MESSAGES_FAILED: &str = "kafka_messages_failed";
    /// Encoded bytes of acknowledged messages
    pub const THROUGHPUT_BYTES: &str = "kafka_throughput_bytes";
    /// One sample per send call, true when acknowledged
    pub const SUCCESS_RATE: &str = "success_rate";
    /// Per-message produce latency in milliseconds
    pub const PRODUCE_LATENCY: &str = "kafka_produce_latency";
    /// Completed iterations
    pub const ITERATIONS: &str = "iterations";
    /// Arrival-rate iterations skipped because the VU pool was exhausted
    pub const DROPPED_ITERATIONS: &str = "dropped_iterations";
    /// Wall time of an iteration in milliseconds, pause included
    pub const ITERATION_DURATION: &str = "iteration_duration";
    /// Duplicate re-sends issued
    pub const MESSAGES_DUPLICATED: &str = "kafka_messages_duplicated";
    /// Active VUs
    pub const VUS: &str = "vus";
    /// Allocated VUs
    pub const VUS_MAX: &str = "vus_max";
}

/// Kind of a metric, fixed when it is first recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Monotonic count
    Counter,
    /// Fraction of true samples
    Rate,
    /// Distribution of values
    Trend,
    /// Current value with its peak
    Gauge,
}

/// A single recording.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Observation {
    /// Add to a counter
    Count(u64),
    /// Add a boolean sample to a rate
    Sample(bool),
    /// Add a value to a trend
    Value(f64),
    /// Move a gauge up or down
    Delta(i64),
}

impl Observation {
    fn kind(self) -> MetricKind {
        match self {
            Self::Count(_) => MetricKind::Counter,
            Self::Sample(_) => MetricKind::Rate,
            Self::Value(_) => MetricKind::Trend,
            Self::Delta(_) => MetricKind::Gauge,
        }
    }
}

#[derive(Debug)]
enum Metric {
    Counter(AtomicU64),
    Rate { passes: AtomicU64, total: AtomicU64 },
    Trend(Trend),
    Gauge { value: AtomicI64, peak: AtomicI64 },
}

impl Metric {
    fn new(kind: MetricKind) -> Self {
        match kind {
            MetricKind::Counter => Self::Counter(AtomicU64::new(0)),
            MetricKind::Rate => Self::Rate { passes: AtomicU64::new(0), total: AtomicU64::new(0) },
            MetricKind::Trend => Self::Trend(Trend::new()),
            MetricKind::Gauge => Self::Gauge { value: AtomicI64::new(0), peak: AtomicI64::new(0) },
        }
    }

    fn kind(&self) -> MetricKind {
        match self {
            Self::Counter(_) => MetricKind::Counter,
            Self::Rate { .. } => MetricKind::Rate,
            Self::Trend(_) => MetricKind::Trend,
            Self::Gauge { .. } => MetricKind::Gauge,
        }
    }

    fn apply(&self, observation: Observation) -> bool {
        match (self, observation) {
            (Self::Counter(count), Observation::Count(n)) => {
                count.fetch_add(n, Ordering::Relaxed);
            },
            (Self::Rate { passes, total }, Observation::Sample(pass)) => {
                if pass {
                    passes.fetch_add(1, Ordering::Relaxed);
                }
                total.fetch_add(1, Ordering::Relaxed);
            },
            (Self::Trend(trend), Observation::Value(v)) => trend.add(v),
            (Self::Gauge { value, peak }, Observation::Delta(delta)) => {
                let now = value.fetch_add(delta, Ordering::AcqRel) + delta;
                peak.fetch_max(now, Ordering::AcqRel);
            },
            _ => return false,
        }
        true
    }

    fn summary(&self) -> MetricSummary {
        match self {
            Self::Counter(count) => MetricSummary::Counter { count: count.load(Ordering::Relaxed) },
            Self::Rate { passes, total } => {
                let total = total.load(Ordering::Relaxed);
                let passes = passes.load(Ordering::Relaxed).min(total);
                MetricSummary::Rate {
                    passes,
                    fails: total - passes,
                    rate: if total == 0 { 0.0 } else { passes as f64 / total as f64 },
                }
            },
            Self::Trend(trend) => MetricSummary::Trend { summary: trend.summary() },
            Self::Gauge { value, peak } => MetricSummary::Gauge {
                value: value.load(Ordering::Relaxed),
                max: peak.load(Ordering::Relaxed),
            },
        }
    }
}

/// Point-in-time view of one metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetricSummary {
    /// Counter total
    Counter {
        /// Total so far
        count: u64,
    },
    /// Rate of true samples
    Rate {
        /// True samples
        passes: u64,
        /// False samples
        fails: u64,
        /// `passes / (passes + fails)`, 0 without samples
        rate: f64,
    },
    /// Distribution summary
    Trend {
        /// `None` until the first observation
        summary: Option<TrendSummary>,
    },
    /// Gauge value and peak
    Gauge {
        /// Current value
        value: i64,
        /// Highest value seen
        max: i64,
    },
}

impl MetricSummary {
    /// Kind of the summarized metric.
    #[must_use]
    pub fn kind(&self) -> MetricKind {
        match self {
            Self::Counter { .. } => MetricKind::Counter,
            Self::Rate { .. } => MetricKind::Rate,
            Self::Trend { .. } => MetricKind::Trend,
            Self::Gauge { .. } => MetricKind::Gauge,
        }
    }
}

/// All metrics at a point in time, keyed by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// When the snapshot was taken
    pub taken_at: DateTime<Utc>,
    /// Summaries by metric name
    pub metrics: BTreeMap<String, MetricSummary>,
}

impl MetricsSnapshot {
    /// Summary of `name`, if it was ever recorded.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&MetricSummary> {
        self.metrics.get(name)
    }

    /// Counter total of `name`, 0 if absent or not a counter.
    #[must_use]
    pub fn counter(&self, name: &str) -> u64 {
        match self.get(name) {
            Some(MetricSummary::Counter { count }) => *count,
            _ => 0,
        }
    }

    /// Rate of `name`, if it is a rate.
    #[must_use]
    pub fn rate(&self, name: &str) -> Option<f64> {
        match self.get(name) {
            Some(MetricSummary::Rate { rate, .. }) => Some(*rate),
            _ => None,
        }
    }

    /// Trend summary of `name`, if it has observations.
    #[must_use]
    pub fn trend(&self, name: &str) -> Option<&TrendSummary> {
        match self.get(name) {
            Some(MetricSummary::Trend { summary }) => summary.as_ref(),
            _ => None,
        }
    }
}

/// Concurrent metric registry, created once per run and shared by every VU.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    metrics: DashMap<String, Arc<Metric>>,
}

impl MetricsRegistry {
    /// Create a registry with the built-in run metrics pre-registered.
    #[must_use]
    pub fn new() -> Self {
        let registry = Self::default();
        for (name, kind) in [
            (names::MESSAGES_SENT, MetricKind::Counter),
            (names::MESSAGES_FAILED, MetricKind::Counter),
            (names::THROUGHPUT_BYTES, MetricKind::Counter),
            (names::SUCCESS_RATE, MetricKind::Rate),
            (names::PRODUCE_LATENCY, MetricKind::Trend),
            (names::ITERATIONS, MetricKind::Counter),
            (names::DROPPED_ITERATIONS, MetricKind::Counter),
            (names::ITERATION_DURATION, MetricKind::Trend),
            (names::MESSAGES_DUPLICATED, MetricKind::Counter),
            (names::VUS, MetricKind::Gauge),
            (names::VUS_MAX, MetricKind::Gauge),
        ] {
            registry.register(name, kind);
        }
        registry
    }

    /// Kind of a registered metric.
    #[must_use]
    pub fn kind_of(&self, name: &str) -> Option<MetricKind> {
        self.metrics.get(name).map(|metric| metric.kind())
    }

    /// Register `name` with `kind` unless it already exists.
    pub fn register(&self, name: &str, kind: MetricKind) {
        self.metrics
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Metric::new(kind)));
    }

    /// Record an observation. The first observation of an unknown name fixes its kind;
    /// observations that do not match an existing metric's kind are dropped with a warning.
    pub fn record(&self, name: &str, observation: Observation) {
        let metric = match self.metrics.get(name) {
            Some(metric) => Arc::clone(metric.value()),
            None => Arc::clone(
                self.metrics
                    .entry(name.to_string())
                    .or_insert_with(|| Arc::new(Metric::new(observation.kind())))
                    .value(),
            ),
        };

        if !metric.apply(observation) {
            warn!(metric = name, kind = ?metric.kind(), ?observation, "Observation does not match metric kind");
        }
    }

    /// Add `n` to a counter.
    pub fn increment(&self, name: &str, n: u64) {
        self.record(name, Observation::Count(n));
    }

    /// Add a rate sample.
    pub fn add_rate_sample(&self, name: &str, pass: bool) {
        self.record(name, Observation::Sample(pass));
    }

    /// Add a trend sample.
    pub fn add_trend_sample(&self, name: &str, value: f64) {
        self.record(name, Observation::Value(value));
    }

    /// Move a gauge.
    pub fn adjust_gauge(&self, name: &str, delta: i64) {
        self.record(name, Observation::Delta(delta));
    }

    /// Account for one producer call: counters, the success sample and, on success, the
    /// per-message latency (the batch round trip divided evenly).
    pub fn record_send(&self, result: &SendResult) {
        if result.is_success() {
            self.increment(names::MESSAGES_SENT, result.succeeded_count as u64);
            self.increment(names::THROUGHPUT_BYTES, result.bytes);
            self.add_trend_sample(names::PRODUCE_LATENCY, duration_ms(result.per_message_latency()));
            self.add_rate_sample(names::SUCCESS_RATE, true);
        } else {
            self.increment(names::MESSAGES_FAILED, result.failed_count as u64);
            self.add_rate_sample(names::SUCCESS_RATE, false);
        }
    }

    /// Summaries of every registered metric.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let metrics = self
            .metrics
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().summary()))
            .collect();
        MetricsSnapshot { taken_at: Utc::now(), metrics }
    }
}

/// Duration as fractional milliseconds, the unit of every time trend.
#[must_use]
pub fn duration_ms(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1_000.0
}
