//! # Scheduler
//!
//! Runs a [`Plan`]: every scenario is started at its offset on its own task and driven by
//! its executor. Cancellation (Ctrl-C) is a `watch` flag observed by offsets, executors
//! and VU pauses; in-flight sends always complete.

mod arrival;
mod constant;
mod ramping;
pub mod vu;

pub use vu::{run_iteration, vu_loop, VuContext, VuState};

use crate::scenarios::{Executor, Plan, Scenario};
use futures::future::join_all;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, info_span, Instrument};

/// How a plan ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Every scenario ran to its end
    Completed,
    /// The run was cancelled before the plan finished
    Cancelled,
}

/// Drives scenario executors.
#[derive(Debug, Clone)]
pub struct Scheduler {
    ctx: VuContext,
    ramp_granularity: Duration,
}

impl Scheduler {
    /// Create a scheduler sharing `ctx` with every VU.
    #[must_use]
    pub fn new(ctx: VuContext, ramp_granularity: Duration) -> Self {
        Self { ctx, ramp_granularity }
    }

    /// Run every scenario of `plan` and wait for all of them.
    pub async fn run(&self, plan: &Plan, cancel: watch::Receiver<bool>) -> RunStatus {
        info!(scenarios = ?plan.names(), total = ?plan.total_duration(), "Starting plan");

        let tasks = plan.scenarios.iter().cloned().map(|scenario| {
            let span = info_span!("scenario", name = %scenario.name, executor = %scenario.executor);
            tokio::spawn(
                run_scenario(scenario, self.ctx.clone(), self.ramp_granularity, cancel.clone())
                    .instrument(span),
            )
        });

        for (result, scenario) in join_all(tasks).await.into_iter().zip(&plan.scenarios) {
            if let Err(e) = result {
                error!(scenario = %scenario.name, error = %e, "Scenario task failed");
            }
        }

        let status = if *cancel.borrow() { RunStatus::Cancelled } else { RunStatus::Completed };
        info!(?status, "Plan finished");
        status
    }
}

async fn run_scenario(
    scenario: Scenario,
    ctx: VuContext,
    granularity: Duration,
    mut cancel: watch::Receiver<bool>,
) {
    if sleep_or_cancel(scenario.start_offset, &mut cancel).await {
        info!(scenario = %scenario.name, "Cancelled before start");
        return;
    }

    let name = scenario.name.as_str();
    match &scenario.executor {
        Executor::ConstantVus { vus, duration } => {
            constant::run(name, ctx, scenario.entrypoint, *vus, *duration, cancel).await;
        },
        executor @ Executor::RampingVus { .. } => {
            ramping::run(name, ctx, scenario.entrypoint, executor, granularity, cancel).await;
        },
        Executor::ConstantArrivalRate { rate, time_unit, duration, pre_allocated_vus, max_vus } => {
            let shape = arrival::ArrivalRate {
                rate: *rate,
                time_unit: *time_unit,
                duration: *duration,
                pre_allocated_vus: *pre_allocated_vus,
                max_vus: *max_vus,
            };
            arrival::run(name, ctx, scenario.entrypoint, shape, cancel).await;
        },
    }
}

/// Resolves once `signal` is set. Never resolves if the sender is gone without setting it.
pub(crate) async fn signalled(signal: &mut watch::Receiver<bool>) {
    if signal.wait_for(|set| *set).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Sleep for `duration` unless `cancel` fires first; returns whether it did.
pub(crate) async fn sleep_or_cancel(duration: Duration, cancel: &mut watch::Receiver<bool>) -> bool {
    if *cancel.borrow() {
        return true;
    }
    if duration.is_zero() {
        return false;
    }
    tokio::select! {
        () = tokio::time::sleep(duration) => false,
        () = signalled(cancel) => true,
    }
}
