//! # Surge Load Generator
//!
//! Scenario-driven load generation against a message broker, in the manner of k6:
//! traffic shapes drive many concurrent virtual users (VUs), each VU produces synthetic
//! order events, metrics are aggregated across VUs, and the final snapshot is checked
//! against pass/fail thresholds.
//!
//! ## Architecture
//!
//! - [`generator`]: synthetic messages, duplicates and the setup probe
//! - [`metrics`]: concurrent counters, rates, trends and gauges
//! - [`scenarios`]: executors, the built-in catalog, entrypoints and run plans
//! - [`scheduler`]: VU tasks and the three executors
//! - [`thresholds`]: expression parsing and evaluation
//! - [`lifecycle`]: setup, run, teardown and the exit status
//! - [`reporting`]: console summary and JSON export
//! - [`observability`]: tracing subscriber setup
//!
//! Data flows one way: scheduler → VU → generator → producer → metrics; the threshold
//! evaluator only reads the final snapshot.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use surge_loadgen::prelude::*;
//!
//! # async fn example() -> surge_core::Result<()> {
//! let mut config = LoadGenConfig::default();
//! config.run.scenario = "smoke".to_string();
//!
//! let ctx = RunContext::from_config(&config)?;
//! let (_cancel, cancel_rx) = tokio::sync::watch::channel(false);
//! let report = surge_loadgen::lifecycle::run(&ctx, cancel_rx).await;
//! println!("{}", render_summary(&report));
//! std::process::exit(report.exit_code());
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod generator;
pub mod lifecycle;
pub mod metrics;
pub mod observability;
pub mod reporting;
pub mod scenarios;
pub mod scheduler;
pub mod thresholds;

pub use lifecycle::{run, RunContext, RunReport, SetupData};
pub use metrics::{MetricsRegistry, MetricsSnapshot};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::generator::{generate, generate_duplicate, setup_probe};
    pub use crate::lifecycle::{RunContext, RunReport, SetupData};
    pub use crate::metrics::{names, MetricSummary, MetricsRegistry, MetricsSnapshot, Observation};
    pub use crate::reporting::{export_json, render_summary};
    pub use crate::scenarios::{Entrypoint, Executor, Plan, PlanBuilder, Scenario, Selection, Stage};
    pub use crate::scheduler::{RunStatus, Scheduler, VuContext};
    pub use crate::thresholds::{ThresholdReport, ThresholdSet, ThresholdStatus};
    pub use surge_core::prelude::*;
    pub use surge_publisher::{Batch, BrokerClient, ProducerAdapter, SendOutcome, SendResult, SimulatedBroker};
}
