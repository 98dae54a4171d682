//! # Thresholds
//!
//! Pass/fail expressions evaluated against a [`MetricsSnapshot`]. Expressions have the
//! form `<aggregation><operator><number>`, e.g. `p(95)<100`, `count<100` or `rate>0.99`.
//! Evaluation never stops a run; it only produces a verdict.

use crate::metrics::{MetricKind, MetricSummary, MetricsRegistry, MetricsSnapshot};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use surge_core::config::ThresholdTable;
use thiserror::Error;
use tracing::warn;

/// Malformed threshold expression.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// No comparison operator found
    #[error("threshold '{0}' has no comparison operator")]
    MissingOperator(String),
    /// Unknown aggregation on the left-hand side
    #[error("threshold '{expression}' uses unknown aggregation '{aggregation}'")]
    UnknownAggregation {
        /// Full expression
        expression: String,
        /// Offending aggregation
        aggregation: String,
    },
    /// Right-hand side is not a number
    #[error("threshold '{expression}' compares against '{value}', which is not a number")]
    InvalidNumber {
        /// Full expression
        expression: String,
        /// Offending value
        value: String,
    },
    /// Aggregation cannot be computed for the metric's kind
    #[error("threshold '{expression}' on {kind:?} metric '{metric}' cannot be evaluated")]
    KindMismatch {
        /// Metric name
        metric: String,
        /// Full expression
        expression: String,
        /// Kind the metric is registered with
        kind: MetricKind,
    },
}

impl From<ParseError> for surge_core::Error {
    fn from(err: ParseError) -> Self {
        surge_core::Error::configuration(err.to_string())
    }
}

/// Statistic a threshold looks at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    /// Trend percentile
    Percentile(f64),
    /// Trend mean
    Avg,
    /// Trend minimum
    Min,
    /// Trend maximum, or gauge peak
    Max,
    /// Trend median
    Med,
    /// Counter total
    Count,
    /// Rate of true samples
    Rate,
    /// Gauge current value
    Value,
}

impl Aggregation {
    fn parse(text: &str, expression: &str) -> Result<Self, ParseError> {
        let unknown = || ParseError::UnknownAggregation {
            expression: expression.to_string(),
            aggregation: text.to_string(),
        };

        match text {
            "avg" => Ok(Self::Avg),
            "min" => Ok(Self::Min),
            "max" => Ok(Self::Max),
            "med" => Ok(Self::Med),
            "count" => Ok(Self::Count),
            "rate" => Ok(Self::Rate),
            "value" => Ok(Self::Value),
            _ => {
                let inner = text
                    .strip_prefix("p(")
                    .and_then(|rest| rest.strip_suffix(')'))
                    .ok_or_else(unknown)?;
                let p: f64 = inner.trim().parse().map_err(|_| unknown())?;
                if !(0.0..=100.0).contains(&p) {
                    return Err(unknown());
                }
                Ok(Self::Percentile(p))
            },
        }
    }

    /// Whether this aggregation can be computed for a metric of `kind`.
    #[must_use]
    pub fn applies_to(self, kind: MetricKind) -> bool {
        match kind {
            MetricKind::Counter => self == Self::Count,
            MetricKind::Rate => self == Self::Rate,
            MetricKind::Gauge => matches!(self, Self::Value | Self::Max),
            MetricKind::Trend => !matches!(self, Self::Count | Self::Rate | Self::Value),
        }
    }

    /// Value of this aggregation in `summary`, `None` when it does not apply or has no data.
    #[must_use]
    pub fn observe(self, summary: &MetricSummary) -> Option<f64> {
        match (self, summary) {
            (Self::Count, MetricSummary::Counter { count }) => Some(*count as f64),
            (Self::Rate, MetricSummary::Rate { passes, fails, rate }) => {
                (passes + fails > 0).then_some(*rate)
            },
            (Self::Value, MetricSummary::Gauge { value, .. }) => Some(*value as f64),
            (Self::Max, MetricSummary::Gauge { max, .. }) => Some(*max as f64),
            (agg, MetricSummary::Trend { summary: Some(trend) }) => match agg {
                Self::Percentile(p) => Some(trend.percentile(p)),
                Self::Avg => Some(trend.avg),
                Self::Min => Some(trend.min),
                Self::Max => Some(trend.max),
                Self::Med => Some(trend.med),
                _ => None,
            },
            _ => None,
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Percentile(p) => write!(f, "p({p})"),
            Self::Avg => f.write_str("avg"),
            Self::Min => f.write_str("min"),
            Self::Max => f.write_str("max"),
            Self::Med => f.write_str("med"),
            Self::Count => f.write_str("count"),
            Self::Rate => f.write_str("rate"),
            Self::Value => f.write_str("value"),
        }
    }
}

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `==`
    Eq,
    /// `!=`
    Ne,
}

impl Operator {
    // two-character operators first so `<=` is not read as `<`
    const ALL: [(&'static str, Self); 6] = [
        ("<=", Self::Le),
        (">=", Self::Ge),
        ("==", Self::Eq),
        ("!=", Self::Ne),
        ("<", Self::Lt),
        (">", Self::Gt),
    ];

    /// Apply the comparison.
    #[must_use]
    pub fn holds(self, observed: f64, expected: f64) -> bool {
        match self {
            Self::Lt => observed < expected,
            Self::Le => observed <= expected,
            Self::Gt => observed > expected,
            Self::Ge => observed >= expected,
            Self::Eq => (observed - expected).abs() < f64::EPSILON,
            Self::Ne => (observed - expected).abs() >= f64::EPSILON,
        }
    }

    const fn symbol(self) -> &'static str {
        match self {
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Eq => "==",
            Self::Ne => "!=",
        }
    }
}

/// Parsed `<aggregation><operator><number>` expression.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Expression {
    /// Left-hand side
    pub aggregation: Aggregation,
    /// Comparison
    pub operator: Operator,
    /// Right-hand side
    pub value: f64,
}

impl FromStr for Expression {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let expression: String = s.chars().filter(|c| !c.is_whitespace()).collect();

        let (index, symbol, operator) = Operator::ALL
            .iter()
            .filter_map(|(symbol, op)| expression.find(symbol).map(|i| (i, *symbol, *op)))
            .min_by_key(|(i, symbol, _)| (*i, std::cmp::Reverse(symbol.len())))
            .ok_or_else(|| ParseError::MissingOperator(s.to_string()))?;

        let lhs = &expression[..index];
        let rhs = &expression[index + symbol.len()..];

        let aggregation = Aggregation::parse(lhs, s)?;
        let value = rhs.parse::<f64>().ok().filter(|v| v.is_finite()).ok_or_else(|| {
            ParseError::InvalidNumber { expression: s.to_string(), value: rhs.to_string() }
        })?;

        Ok(Self { aggregation, operator, value })
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.aggregation, self.operator.symbol(), self.value)
    }
}

/// An expression bound to a metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    /// Metric the expression reads
    pub metric: String,
    /// Expression text as declared
    pub source: String,
    /// Parsed expression
    pub expression: Expression,
}

/// Result of one threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ThresholdStatus {
    /// Expression held
    Passed {
        /// Observed statistic
        observed: f64,
    },
    /// Expression did not hold
    Failed {
        /// Observed statistic
        observed: f64,
    },
    /// Metric missing or without observations; does not fail the run
    NoData,
}

impl ThresholdStatus {
    /// Whether the status counts against the verdict.
    #[must_use]
    pub const fn is_failure(self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Evaluated threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdResult {
    /// Expression text as declared
    pub expression: String,
    /// Outcome
    #[serde(flatten)]
    pub status: ThresholdStatus,
}

/// Results per metric and the overall verdict.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThresholdReport {
    /// Results keyed by metric name, in declaration order within a metric
    pub results: BTreeMap<String, Vec<ThresholdResult>>,
}

impl ThresholdReport {
    /// AND of every result; `NoData` does not fail.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.results.values().flatten().all(|r| !r.status.is_failure())
    }

    /// `(metric, result)` pairs that failed.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &ThresholdResult)> {
        self.results
            .iter()
            .flat_map(|(metric, results)| results.iter().map(move |r| (metric.as_str(), r)))
            .filter(|(_, r)| r.status.is_failure())
    }
}

/// Every configured threshold.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThresholdSet {
    thresholds: Vec<Threshold>,
}

impl ThresholdSet {
    /// Parse every expression of `table`.
    ///
    /// # Errors
    /// Returns the first malformed expression.
    pub fn from_table(table: &ThresholdTable) -> Result<Self, ParseError> {
        let mut thresholds = Vec::new();
        for (metric, expressions) in &table.0 {
            for source in expressions {
                thresholds.push(Threshold {
                    metric: metric.clone(),
                    source: source.clone(),
                    expression: source.parse()?,
                });
            }
        }
        Ok(Self { thresholds })
    }

    /// Add one threshold.
    ///
    /// # Errors
    /// Returns an error if `expression` is malformed.
    pub fn add(&mut self, metric: &str, expression: &str) -> Result<(), ParseError> {
        self.thresholds.push(Threshold {
            metric: metric.to_string(),
            source: expression.to_string(),
            expression: expression.parse()?,
        });
        Ok(())
    }

    /// Declared thresholds.
    #[must_use]
    pub fn thresholds(&self) -> &[Threshold] {
        &self.thresholds
    }

    /// Number of thresholds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.thresholds.len()
    }

    /// Whether no threshold is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.thresholds.is_empty()
    }

    /// Reject thresholds whose aggregation does not fit the kind of an already registered
    /// metric. Metrics unknown to `registry` are left to evaluation.
    ///
    /// # Errors
    /// Returns the first mismatching threshold.
    pub fn check_kinds(&self, registry: &MetricsRegistry) -> Result<(), ParseError> {
        for threshold in &self.thresholds {
            let Some(kind) = registry.kind_of(&threshold.metric) else {
                continue;
            };
            if !threshold.expression.aggregation.applies_to(kind) {
                return Err(ParseError::KindMismatch {
                    metric: threshold.metric.clone(),
                    expression: threshold.source.clone(),
                    kind,
                });
            }
        }
        Ok(())
    }

    /// Evaluate every threshold against `snapshot`, warning about thresholds without data.
    #[must_use]
    pub fn evaluate(&self, snapshot: &MetricsSnapshot) -> ThresholdReport {
        self.evaluate_with(snapshot, true)
    }

    /// Evaluate without logging, for interim checks while the run is in progress.
    #[must_use]
    pub fn evaluate_interim(&self, snapshot: &MetricsSnapshot) -> ThresholdReport {
        self.evaluate_with(snapshot, false)
    }

    fn evaluate_with(&self, snapshot: &MetricsSnapshot, warn_missing: bool) -> ThresholdReport {
        let mut report = ThresholdReport::default();

        for threshold in &self.thresholds {
            let observed = snapshot
                .get(&threshold.metric)
                .and_then(|summary| threshold.expression.aggregation.observe(summary));

            let status = match observed {
                Some(observed) if threshold.expression.operator.holds(observed, threshold.expression.value) => {
                    ThresholdStatus::Passed { observed }
                },
                Some(observed) => ThresholdStatus::Failed { observed },
                None => {
                    if warn_missing {
                        warn!(
                            metric = %threshold.metric,
                            threshold = %threshold.source,
                            "No data for threshold"
                        );
                    }
                    ThresholdStatus::NoData
                },
            };

            report
                .results
                .entry(threshold.metric.clone())
                .or_default()
                .push(ThresholdResult { expression: threshold.source.clone(), status });
        }

        report
    }
}
