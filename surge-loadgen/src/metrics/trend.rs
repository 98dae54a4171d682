//! Distribution metric with sharded sample storage.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::sync::atomic::{AtomicUsize, Ordering};

const SHARDS: usize = 16;

static NEXT_SHARD: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    // Each worker thread sticks to one shard so concurrent VUs rarely share a lock.
    static SHARD_HINT: Cell<usize> = Cell::new(NEXT_SHARD.fetch_add(1, Ordering::Relaxed) % SHARDS);
}

/// Every observed sample, kept for exact percentiles at the end of the run.
#[derive(Debug)]
pub struct Trend {
    shards: Vec<Mutex<Vec<f64>>>,
}

impl Trend {
    /// Create an empty trend.
    #[must_use]
    pub fn new() -> Self {
        Self { shards: (0..SHARDS).map(|_| Mutex::new(Vec::new())).collect() }
    }

    /// Add one observation. Non-finite values are ignored.
    pub fn add(&self, value: f64) {
        if !value.is_finite() {
            return;
        }
        let shard = SHARD_HINT.with(Cell::get);
        self.shards[shard].lock().push(value);
    }

    /// Number of observations so far.
    #[must_use]
    pub fn count(&self) -> usize {
        self.shards.iter().map(|s| s.lock().len()).sum()
    }

    /// Summarize all observations; `None` until the first one arrives.
    #[must_use]
    pub fn summary(&self) -> Option<TrendSummary> {
        let mut samples: Vec<f64> = Vec::new();
        for shard in &self.shards {
            samples.extend_from_slice(&shard.lock());
        }
        TrendSummary::from_samples(samples)
    }
}

impl Default for Trend {
    fn default() -> Self {
        Self::new()
    }
}

/// Aggregated view of a trend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSummary {
    /// Number of observations
    pub count: u64,
    /// Smallest observation
    pub min: f64,
    /// Largest observation
    pub max: f64,
    /// Arithmetic mean
    pub avg: f64,
    /// Median
    pub med: f64,
    /// 90th percentile
    pub p90: f64,
    /// 95th percentile
    pub p95: f64,
    /// 99th percentile
    pub p99: f64,
    #[serde(skip)]
    sorted: Vec<f64>,
}

impl TrendSummary {
    /// Build a summary from raw samples, `None` when empty.
    #[must_use]
    pub fn from_samples(mut samples: Vec<f64>) -> Option<Self> {
        samples.retain(|v| v.is_finite());
        if samples.is_empty() {
            return None;
        }
        samples.sort_by(f64::total_cmp);

        let count = samples.len();
        let sum: f64 = samples.iter().sum();
        Some(Self {
            count: count as u64,
            min: samples[0],
            max: samples[count - 1],
            avg: sum / count as f64,
            med: percentile(&samples, 50.0),
            p90: percentile(&samples, 90.0),
            p95: percentile(&samples, 95.0),
            p99: percentile(&samples, 99.0),
            sorted: samples,
        })
    }

    /// Arbitrary percentile `p` in `[0, 100]`.
    #[must_use]
    pub fn percentile(&self, p: f64) -> f64 {
        percentile(&self.sorted, p)
    }
}

/// Percentile of sorted, non-empty `samples`, interpolating linearly between closest ranks.
#[must_use]
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let rank = (p.clamp(0.0, 100.0) / 100.0) * (n - 1) as f64;
            let lower = rank.floor() as usize;
            let upper = rank.ceil() as usize;
            let weight = rank - lower as f64;
            sorted[lower] + (sorted[upper] - sorted[lower]) * weight
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_interpolates() {
        let sorted = [50.0, 60.0, 70.0, 80.0, 90.0, 95.0, 100.0, 300.0];
        // rank 0.95 * 7 = 6.65 -> 100 + 0.65 * 200
        assert!((percentile(&sorted, 95.0) - 230.0).abs() < 1e-9);
        assert!((percentile(&sorted, 50.0) - 85.0).abs() < 1e-9);
        assert_eq!(percentile(&sorted, 0.0), 50.0);
        assert_eq!(percentile(&sorted, 100.0), 300.0);
    }

    #[test]
    fn test_empty_trend_has_no_summary() {
        assert!(Trend::new().summary().is_none());
    }

    #[test]
    fn test_summary() {
        let trend = Trend::new();
        for v in [4.0, 1.0, 3.0, 2.0] {
            trend.add(v);
        }
        trend.add(f64::NAN);

        let summary = trend.summary().unwrap();
        assert_eq!(summary.count, 4);
        assert_eq!(summary.min, 1.0);
        assert_eq!(summary.max, 4.0);
        assert!((summary.avg - 2.5).abs() < 1e-9);
        assert!((summary.med - 2.5).abs() < 1e-9);
    }
}
