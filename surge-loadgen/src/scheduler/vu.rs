//! Virtual users: the per-iteration routine and a pool of looping VU tasks.

use super::signalled;
use crate::generator::{generate_duplicate_with, generate_with};
use crate::metrics::{duration_ms, names, MetricsRegistry};
use crate::scenarios::{Entrypoint, RecentIds};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use surge_publisher::{Batch, ProducerAdapter};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, warn};

/// What every VU shares.
#[derive(Debug, Clone)]
pub struct VuContext {
    /// Producer used by all VUs
    pub producer: Arc<ProducerAdapter>,
    /// Run-wide metrics
    pub metrics: Arc<MetricsRegistry>,
    /// Probability that an iteration also re-sends a recent id
    pub duplicate_ratio: f64,
}

impl VuContext {
    /// Bundle the shared handles.
    #[must_use]
    pub fn new(producer: Arc<ProducerAdapter>, metrics: Arc<MetricsRegistry>, duplicate_ratio: f64) -> Self {
        Self { producer, metrics, duplicate_ratio: duplicate_ratio.clamp(0.0, 1.0) }
    }
}

/// State a VU carries from one iteration to the next.
#[derive(Debug)]
pub struct VuState {
    /// VU number within its scenario
    pub id: u64,
    recent: RecentIds,
    rng: StdRng,
}

impl VuState {
    /// Fresh state with an entropy-seeded RNG.
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self { id, recent: RecentIds::default(), rng: StdRng::from_entropy() }
    }

    /// Ids this VU sent recently.
    #[must_use]
    pub fn recent(&self) -> &RecentIds {
        &self.recent
    }
}

/// Run one iteration of `entrypoint` and return the pause it asks for.
///
/// Every produce call is accounted in the metrics; failures never abort the iteration.
pub async fn run_iteration(ctx: &VuContext, entrypoint: Entrypoint, state: &mut VuState) -> Option<Duration> {
    let plan = entrypoint.plan(&mut state.rng);

    for send in plan.sends {
        let messages = (0..send.messages()).map(|_| generate_with(&mut state.rng)).collect();
        let batch = match Batch::new(messages) {
            Ok(batch) => batch,
            Err(e) => {
                warn!(vu = state.id, error = %e, "Skipping unsendable batch");
                continue;
            },
        };

        let result = ctx.producer.send(&batch).await;
        ctx.metrics.record_send(&result);
        if result.is_success() {
            for message in batch.into_inner() {
                state.recent.remember(message.message_id);
            }
        } else {
            debug!(vu = state.id, messages = result.failed_count, outcome = ?result.outcome, "Send failed");
        }
    }

    if ctx.duplicate_ratio > 0.0 && state.rng.gen_bool(ctx.duplicate_ratio) {
        if let Some(id) = state.recent.pick(&mut state.rng).cloned() {
            let duplicate = generate_duplicate_with(&mut state.rng, &id);
            let result = ctx.producer.send_one(duplicate).await;
            ctx.metrics.record_send(&result);
            ctx.metrics.increment(names::MESSAGES_DUPLICATED, 1);
        }
    }

    plan.pause
}

/// Count a finished iteration that started at `started`.
pub(crate) fn record_iteration(metrics: &MetricsRegistry, started: Instant) {
    metrics.increment(names::ITERATIONS, 1);
    metrics.add_trend_sample(names::ITERATION_DURATION, duration_ms(started.elapsed()));
}

/// Loop `entrypoint` until `stop` is set. The current iteration always completes; only
/// the pause between iterations is cut short.
pub async fn vu_loop(
    ctx: VuContext,
    entrypoint: Entrypoint,
    mut state: VuState,
    mut stop: watch::Receiver<bool>,
) -> VuState {
    ctx.metrics.adjust_gauge(names::VUS, 1);

    while !*stop.borrow() {
        let started = Instant::now();
        match run_iteration(&ctx, entrypoint, &mut state).await {
            Some(pause) => {
                tokio::select! {
                    () = tokio::time::sleep(pause) => {},
                    () = signalled(&mut stop) => {},
                }
            },
            None => tokio::task::yield_now().await,
        }
        record_iteration(&ctx.metrics, started);
    }

    ctx.metrics.adjust_gauge(names::VUS, -1);
    state
}

struct VuHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<VuState>,
}

/// Looping VUs of one scenario, grown and shrunk on demand.
pub(crate) struct VuPool {
    ctx: VuContext,
    entrypoint: Entrypoint,
    scenario: String,
    active: Vec<VuHandle>,
    retiring: Vec<JoinHandle<VuState>>,
    next_id: u64,
}

impl VuPool {
    pub(crate) fn new(ctx: VuContext, entrypoint: Entrypoint, scenario: impl Into<String>) -> Self {
        Self {
            ctx,
            entrypoint,
            scenario: scenario.into(),
            active: Vec::new(),
            retiring: Vec::new(),
            next_id: 1,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.active.len()
    }

    /// Start or retire VUs until exactly `target` are active. Retired VUs finish their
    /// current iteration in the background.
    pub(crate) fn scale_to(&mut self, target: usize) {
        while self.active.len() < target {
            let (stop, stop_rx) = watch::channel(false);
            let state = VuState::new(self.next_id);
            self.next_id += 1;
            let task = tokio::spawn(vu_loop(self.ctx.clone(), self.entrypoint, state, stop_rx));
            self.active.push(VuHandle { stop, task });
        }

        while self.active.len() > target {
            if let Some(vu) = self.active.pop() {
                let _ = vu.stop.send(true);
                self.retiring.push(vu.task);
            }
        }

        self.retiring.retain(|task| !task.is_finished());
    }

    /// Stop every VU and wait for all of them, retired ones included.
    pub(crate) async fn shutdown(mut self) {
        self.scale_to(0);
        for task in self.retiring.drain(..) {
            if let Err(e) = task.await {
                error!(scenario = %self.scenario, error = %e, "VU task failed");
            }
        }
        debug!(scenario = %self.scenario, started = self.next_id - 1, "VU pool drained");
    }
}
