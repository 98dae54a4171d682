//! Configuration schema definitions for Surge.
//!
//! The schema is layered: defaults → file → environment → CLI overrides. Every section
//! carries serde defaults so a partial file or an empty environment still yields a complete,
//! valid configuration.

use crate::types::BrokerList;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use validator::{Validate, ValidationError};

/// Default topic written to when nothing else is configured.
pub const DEFAULT_TOPIC: &str = "high-volume-topic";

/// Default scenario selector.
pub const DEFAULT_SCENARIO: &str = "all";

/// Root configuration for a load generation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LoadGenConfig {
    /// Target broker and topic
    #[validate(nested)]
    pub broker: BrokerSection,

    /// Scenario selection and scheduler tuning
    #[validate(nested)]
    pub run: RunSection,

    /// Behaviour of the in-process simulated broker
    #[validate(nested)]
    pub simulation: SimulationSection,

    /// Pass/fail expressions keyed by metric name
    pub thresholds: ThresholdTable,
}

/// Threshold expressions keyed by metric name, e.g. `success_rate = ["rate>0.99"]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThresholdTable(pub BTreeMap<String, Vec<String>>);

impl Default for ThresholdTable {
    fn default() -> Self {
        let mut table = BTreeMap::new();
        table.insert(
            "kafka_produce_latency".to_string(),
            vec!["p(95)<100".to_string(), "p(99)<200".to_string()],
        );
        table.insert("kafka_messages_failed".to_string(), vec!["count<100".to_string()]);
        table.insert("success_rate".to_string(), vec!["rate>0.99".to_string()]);
        Self(table)
    }
}

/// Broker connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct BrokerSection {
    /// Endpoints, comma-separated in the environment
    pub brokers: BrokerList,

    /// Topic every scenario writes to
    #[validate(length(min = 1, max = 249))]
    pub topic: String,
}

impl Default for BrokerSection {
    fn default() -> Self {
        Self {
            brokers: BrokerList::default(),
            topic: DEFAULT_TOPIC.to_string(),
        }
    }
}

/// Scenario selection and scheduler tuning.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
#[validate(schema(function = "validate_run_section"))]
pub struct RunSection {
    /// `smoke|load|stress|spike|max|all`
    #[validate(length(min = 1))]
    pub scenario: String,

    /// Probability that an iteration also re-sends a previously used message id
    #[validate(range(min = 0.0, max = 1.0))]
    pub duplicate_ratio: f64,

    /// How often ramping executors re-evaluate their VU target
    #[serde(with = "humantime_serde")]
    pub ramp_granularity: Duration,

    /// Interval for interim progress and threshold logging (zero disables)
    #[serde(with = "humantime_serde")]
    pub report_interval: Duration,

    /// Pause inserted between scenarios when they are chained sequentially
    #[serde(with = "humantime_serde")]
    pub scenario_gap: Duration,
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            scenario: DEFAULT_SCENARIO.to_string(),
            duplicate_ratio: 0.0,
            ramp_granularity: Duration::from_millis(100),
            report_interval: Duration::from_secs(10),
            scenario_gap: Duration::from_secs(5),
        }
    }
}

/// Simulated broker behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
#[validate(schema(function = "validate_simulation_section"))]
pub struct SimulationSection {
    /// Lower bound of the simulated produce round trip
    #[serde(with = "humantime_serde")]
    pub min_latency: Duration,

    /// Upper bound of the simulated produce round trip
    #[serde(with = "humantime_serde")]
    pub max_latency: Duration,

    /// Fraction of produce calls that fail
    #[validate(range(min = 0.0, max = 1.0))]
    pub failure_ratio: f64,
}

impl Default for SimulationSection {
    fn default() -> Self {
        Self {
            min_latency: Duration::from_millis(1),
            max_latency: Duration::from_millis(5),
            failure_ratio: 0.0,
        }
    }
}

fn validate_run_section(run: &RunSection) -> Result<(), ValidationError> {
    if run.ramp_granularity.is_zero() {
        return Err(ValidationError::new("ramp_granularity_must_be_positive"));
    }
    Ok(())
}

fn validate_simulation_section(sim: &SimulationSection) -> Result<(), ValidationError> {
    if sim.min_latency > sim.max_latency {
        return Err(ValidationError::new("min_latency_exceeds_max_latency"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = LoadGenConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.broker.topic, DEFAULT_TOPIC);
        assert_eq!(config.run.scenario, DEFAULT_SCENARIO);
        assert_eq!(config.thresholds.0.len(), 3);
    }

    #[test]
    fn test_duplicate_ratio_out_of_range() {
        let mut config = LoadGenConfig::default();
        config.run.duplicate_ratio = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_inverted_latency_bounds_rejected() {
        let mut config = LoadGenConfig::default();
        config.simulation.min_latency = Duration::from_millis(10);
        config.simulation.max_latency = Duration::from_millis(1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: LoadGenConfig = toml::from_str(
            r#"
            [run]
            scenario = "smoke"
            report_interval = "2s"
            "#,
        )
        .unwrap();

        assert_eq!(config.run.scenario, "smoke");
        assert_eq!(config.run.report_interval, Duration::from_secs(2));
        assert_eq!(config.run.scenario_gap, Duration::from_secs(5));
        assert_eq!(config.broker.topic, DEFAULT_TOPIC);
    }
}
