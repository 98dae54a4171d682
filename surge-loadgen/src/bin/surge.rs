//! `surge`: run a load test scenario against the broker and exit with the verdict.
use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use surge_core::{config::ConfigLoader, BrokerList, LoadGenConfig};
use surge_loadgen::lifecycle::{self, RunContext, RunReport, EXIT_CONFIG_ERROR};
use surge_loadgen::observability::{init_tracing, LogFormat};
use surge_loadgen::reporting::{export_json, render_summary};
use tokio::sync::watch;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "surge")]
#[command(about = "Scenario-driven load generator for a message broker")]
#[command(version)]
struct Args {
    /// Configuration file (defaults to surge.toml in the search paths)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Scenario: smoke, load, stress, spike, max or all (overrides `SCENARIO`)
    #[arg(long, short = 's')]
    scenario: Option<String>,

    /// Comma-separated broker endpoints (overrides `KAFKA_BROKERS`)
    #[arg(long)]
    brokers: Option<BrokerList>,

    /// Destination topic (overrides `KAFKA_TOPIC`)
    #[arg(long)]
    topic: Option<String>,

    /// Probability that an iteration also re-sends a recent message id
    #[arg(long)]
    duplicate_ratio: Option<f64>,

    /// Interval between progress reports (0s disables), e.g. "10s"
    #[arg(long, value_parser = parse_duration)]
    report_interval: Option<Duration>,

    /// Fraction of simulated produce calls that fail
    #[arg(long)]
    failure_ratio: Option<f64>,

    /// Write the end-of-run summary as JSON to this path
    #[arg(long)]
    summary_export: Option<PathBuf>,

    /// Log line format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

fn parse_duration(value: &str) -> Result<Duration, humantime_serde::re::humantime::DurationError> {
    humantime_serde::re::humantime::parse_duration(value)
}

impl Args {
    fn load_config(&self) -> Result<LoadGenConfig> {
        let mut loader = ConfigLoader::new();
        if let Some(path) = &self.config {
            loader = loader.with_file(path);
        }
        let mut config = loader.load().context("load configuration")?;

        if let Some(scenario) = &self.scenario {
            config.run.scenario.clone_from(scenario);
        }
        if let Some(brokers) = &self.brokers {
            config.broker.brokers = brokers.clone();
        }
        if let Some(topic) = &self.topic {
            config.broker.topic.clone_from(topic);
        }
        if let Some(ratio) = self.duplicate_ratio {
            anyhow::ensure!((0.0..=1.0).contains(&ratio), "--duplicate-ratio must be within [0, 1]");
            config.run.duplicate_ratio = ratio;
        }
        if let Some(interval) = self.report_interval {
            config.run.report_interval = interval;
        }
        if let Some(ratio) = self.failure_ratio {
            anyhow::ensure!((0.0..=1.0).contains(&ratio), "--failure-ratio must be within [0, 1]");
            config.simulation.failure_ratio = ratio;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(e) = init_tracing(args.log_format) {
        eprintln!("failed to initialise logging: {e}");
    }

    match run(args).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!(error = %format!("{e:#}"), "Fatal error");
            ExitCode::from(EXIT_CONFIG_ERROR as u8)
        },
    }
}

async fn run(args: Args) -> Result<u8> {
    let config = args.load_config()?;
    let ctx = RunContext::from_config(&config).context("prepare run")?;

    let (cancel, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping VUs");
            let _ = cancel.send(true);
        }
    });

    let report = lifecycle::run(&ctx, cancel_rx).await;
    println!("{}", render_summary(&report));

    Ok(finish(&report, args.summary_export.as_deref()))
}

/// Export the summary if requested and return the verdict. A failed export is logged
/// and does not replace the verdict.
fn finish(report: &RunReport, summary_export: Option<&Path>) -> u8 {
    if let Some(path) = summary_export {
        if let Err(e) = export_json(report, path) {
            error!(path = %path.display(), error = %e, "Failed to export summary");
        }
    }

    let code = report.exit_code();
    info!(exit_code = code, passed = report.passed(), "Exiting");
    u8::try_from(code).unwrap_or(u8::MAX)
}
