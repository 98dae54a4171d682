//! # Run Lifecycle
//!
//! `setup` → scheduler → `teardown` → threshold verdict. Teardown runs whether the plan
//! completed or was cancelled.

use crate::generator::setup_probe;
use crate::metrics::{names, MetricsRegistry, MetricsSnapshot};
use crate::scenarios::{select, Selection};
use crate::scheduler::{RunStatus, Scheduler, VuContext};
use crate::thresholds::{ThresholdReport, ThresholdSet};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use surge_core::{config::RunSection, LoadGenConfig, Result, Timestamp};
use surge_publisher::{BrokerClient, ProducerAdapter, PublisherConfig, SendOutcome, SimulatedBroker};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

/// Exit status when every threshold passed.
pub const EXIT_SUCCESS: i32 = 0;
/// Exit status for a fatal configuration error.
pub const EXIT_CONFIG_ERROR: i32 = 1;
/// Exit status when at least one threshold failed.
pub const EXIT_THRESHOLDS_FAILED: i32 = 99;

const BANNER_WIDTH: usize = 60;

/// Everything a run shares, built once before setup.
#[derive(Debug)]
pub struct RunContext {
    /// Resolved scenario plan
    pub selection: Selection,
    /// Producer shared by every VU
    pub producer: Arc<ProducerAdapter>,
    /// Run-wide metrics
    pub metrics: Arc<MetricsRegistry>,
    /// Broker and topic settings
    pub publisher: PublisherConfig,
    /// Parsed thresholds
    pub thresholds: ThresholdSet,
    /// Scheduler tuning
    pub settings: RunSection,
}

impl RunContext {
    /// Build a context writing through a [`SimulatedBroker`] configured by `config`.
    ///
    /// # Errors
    /// Returns a configuration error for an invalid topic or a malformed threshold.
    pub fn from_config(config: &LoadGenConfig) -> Result<Self> {
        let client = Arc::new(SimulatedBroker::new(&config.simulation));
        Self::with_client(config, client)
    }

    /// Build a context writing through `client`.
    ///
    /// # Errors
    /// Returns a configuration error for an invalid topic, a malformed threshold or a
    /// threshold whose aggregation does not fit its metric.
    pub fn with_client(config: &LoadGenConfig, client: Arc<dyn BrokerClient>) -> Result<Self> {
        let publisher = PublisherConfig::from_loadgen(config)
            .map_err(|e| surge_core::Error::configuration(e.to_string()))?;
        let metrics = Arc::new(MetricsRegistry::new());
        let thresholds = ThresholdSet::from_table(&config.thresholds)?;
        thresholds.check_kinds(&metrics)?;
        let selection = select(&config.run.scenario, config.run.scenario_gap);
        selection.plan.validate()?;

        Ok(Self {
            selection,
            producer: Arc::new(ProducerAdapter::new(client, publisher.topic.clone())),
            metrics,
            publisher,
            thresholds,
            settings: config.run.clone(),
        })
    }

    fn vu_context(&self) -> VuContext {
        VuContext::new(self.producer.clone(), self.metrics.clone(), self.settings.duplicate_ratio)
    }
}

/// Returned by [`setup`] and handed to [`teardown`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetupData {
    /// When setup finished
    pub start_time: Timestamp,
    /// Broker endpoints, comma-separated
    pub brokers: String,
    /// Destination topic
    pub topic: String,
    /// Whether the connectivity probe was acknowledged
    pub probe_ok: bool,
}

/// Log the banner and send the connectivity probe. A failed probe is logged, not fatal.
pub async fn setup(ctx: &RunContext) -> SetupData {
    let separator = "=".repeat(BANNER_WIDTH);
    info!("{separator}");
    info!("Surge broker load test");
    info!("{separator}");
    info!(brokers = %ctx.publisher.brokers, "Brokers");
    info!(topic = %ctx.publisher.topic, "Topic");
    info!(
        scenario = %ctx.selection.requested,
        plan = ?ctx.selection.plan.names(),
        total = ?ctx.selection.plan.total_duration(),
        "Scenario"
    );
    if ctx.selection.fallback {
        warn!(
            requested = %ctx.selection.requested,
            running = ?ctx.selection.plan.names(),
            "FALLBACK: unknown scenario selector"
        );
    }
    info!("{separator}");

    let result = ctx.producer.send_one(setup_probe()).await;
    let probe_ok = match &result.outcome {
        SendOutcome::Acknowledged => {
            info!(elapsed = ?result.elapsed, "Broker connection successful");
            true
        },
        SendOutcome::Failed(e) => {
            error!(error = %e, "Broker connection failed");
            false
        },
    };

    SetupData {
        start_time: Utc::now(),
        brokers: ctx.publisher.brokers.to_string(),
        topic: ctx.publisher.topic.to_string(),
        probe_ok,
    }
}

/// Log start and end times and close the producer. Errors are logged, not returned.
pub async fn teardown(ctx: &RunContext, data: &SetupData) {
    let separator = "=".repeat(BANNER_WIDTH);
    info!("{separator}");
    info!("Test completed");
    info!(started_at = %data.start_time.to_rfc3339(), "Started");
    info!(ended_at = %Utc::now().to_rfc3339(), "Ended");
    info!("{separator}");

    if let Err(e) = ctx.producer.close().await {
        error!(error = %e, "Failed to close producer");
    }
}

/// Outcome of a full run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Selector as given
    pub requested_scenario: String,
    /// Scenarios that actually ran
    pub scenarios: Vec<String>,
    /// Whether the fallback scenario replaced an unknown selector
    pub fallback: bool,
    /// Data returned by setup
    pub setup: SetupData,
    /// Whether the plan completed or was cancelled
    pub cancelled: bool,
    /// When the plan finished
    pub finished_at: Timestamp,
    /// Final metrics
    pub snapshot: MetricsSnapshot,
    /// Threshold results
    pub thresholds: ThresholdReport,
}

impl RunReport {
    /// Whether every threshold passed.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.thresholds.passed()
    }

    /// Process exit status for this run.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        if self.passed() {
            EXIT_SUCCESS
        } else {
            EXIT_THRESHOLDS_FAILED
        }
    }
}

/// Run setup, the plan and teardown, then evaluate thresholds.
///
/// Setting `cancel` stops the plan early; teardown and evaluation still happen.
pub async fn run(ctx: &RunContext, cancel: watch::Receiver<bool>) -> RunReport {
    let setup_data = setup(ctx).await;

    let (progress_stop, progress_rx) = watch::channel(false);
    let progress = spawn_progress(ctx, progress_rx);

    let scheduler = Scheduler::new(ctx.vu_context(), ctx.settings.ramp_granularity);
    let status = scheduler.run(&ctx.selection.plan, cancel).await;
    if status == RunStatus::Cancelled {
        warn!("Run cancelled, tearing down");
    }

    let _ = progress_stop.send(true);
    if let Some(progress) = progress {
        let _ = progress.await;
    }

    teardown(ctx, &setup_data).await;

    let snapshot = ctx.metrics.snapshot();
    let thresholds = ctx.thresholds.evaluate(&snapshot);
    for (metric, result) in thresholds.failures() {
        warn!(metric, threshold = %result.expression, status = ?result.status, "Threshold failed");
    }
    info!(
        passed = thresholds.passed(),
        sent = snapshot.counter(names::MESSAGES_SENT),
        failed = snapshot.counter(names::MESSAGES_FAILED),
        "Run finished"
    );

    RunReport {
        requested_scenario: ctx.selection.requested.clone(),
        scenarios: ctx.selection.plan.names().into_iter().map(str::to_string).collect(),
        fallback: ctx.selection.fallback,
        setup: setup_data,
        cancelled: status == RunStatus::Cancelled,
        finished_at: Utc::now(),
        snapshot,
        thresholds,
    }
}

/// Periodically log progress and interim threshold status; `None` when disabled.
fn spawn_progress(ctx: &RunContext, mut stop: watch::Receiver<bool>) -> Option<JoinHandle<()>> {
    let every = ctx.settings.report_interval;
    if every.is_zero() {
        return None;
    }

    let metrics = ctx.metrics.clone();
    let thresholds = ctx.thresholds.clone();
    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = ticker.tick() => log_progress(&metrics.snapshot(), &thresholds),
                () = crate::scheduler::signalled(&mut stop) => break,
            }
        }
    }))
}

fn log_progress(snapshot: &MetricsSnapshot, thresholds: &ThresholdSet) {
    let interim = thresholds.evaluate_interim(snapshot);
    let p95 = snapshot.trend(names::PRODUCE_LATENCY).map(|t| t.p95);
    info!(
        sent = snapshot.counter(names::MESSAGES_SENT),
        failed = snapshot.counter(names::MESSAGES_FAILED),
        iterations = snapshot.counter(names::ITERATIONS),
        dropped = snapshot.counter(names::DROPPED_ITERATIONS),
        success_rate = snapshot.rate(names::SUCCESS_RATE),
        latency_p95_ms = p95,
        thresholds_passing = interim.passed(),
        "Progress"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let mut report = RunReport {
            requested_scenario: "smoke".to_string(),
            scenarios: vec!["smoke".to_string()],
            fallback: false,
            setup: SetupData {
                start_time: Utc::now(),
                brokers: "localhost:9092".to_string(),
                topic: "t".to_string(),
                probe_ok: true,
            },
            cancelled: false,
            finished_at: Utc::now(),
            snapshot: MetricsRegistry::new().snapshot(),
            thresholds: ThresholdReport::default(),
        };
        assert_eq!(report.exit_code(), EXIT_SUCCESS);

        report.thresholds.results.insert(
            "x".to_string(),
            vec![crate::thresholds::ThresholdResult {
                expression: "count<1".to_string(),
                status: crate::thresholds::ThresholdStatus::Failed { observed: 2.0 },
            }],
        );
        assert_eq!(report.exit_code(), EXIT_THRESHOLDS_FAILED);
    }

    #[test]
    fn test_malformed_threshold_is_configuration_error() {
        let mut config = LoadGenConfig::default();
        config.thresholds.0.insert("success_rate".to_string(), vec!["rate~1".to_string()]);
        let err = RunContext::from_config(&config).unwrap_err();
        assert!(matches!(err, surge_core::Error::Configuration { .. }));
    }

    #[test]
    fn test_threshold_kind_mismatch_is_configuration_error() {
        let mut config = LoadGenConfig::default();
        config.thresholds.0.insert("success_rate".to_string(), vec!["p(95)<100".to_string()]);
        let err = RunContext::from_config(&config).unwrap_err();
        assert!(matches!(err, surge_core::Error::Configuration { .. }));
    }

    #[test]
    fn test_unknown_scenario_is_not_fatal() {
        let mut config = LoadGenConfig::default();
        config.run.scenario = "bogus".to_string();
        let ctx = RunContext::from_config(&config).unwrap();
        assert!(ctx.selection.fallback);
        assert_eq!(ctx.selection.plan.names(), ["load"]);
    }
}
