//! `constant-arrival-rate` executor.
//!
//! Iterations start on a fixed schedule whatever their latency. Each in-flight iteration
//! holds a semaphore permit; the pool starts at the pre-allocated size and grows one VU at
//! a time up to the maximum. A due iteration that finds the pool exhausted is dropped.

use super::{signalled, vu::record_iteration, vu::run_iteration, vu::VuContext, vu::VuState};
use crate::metrics::names;
use crate::scenarios::Entrypoint;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Shortest scheduling tick; iterations due within one tick are started together.
const MIN_TICK: Duration = Duration::from_millis(1);

/// Arrival-rate shape parameters.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ArrivalRate {
    pub rate: u32,
    pub time_unit: Duration,
    pub duration: Duration,
    pub pre_allocated_vus: u32,
    pub max_vus: u32,
}

impl ArrivalRate {
    /// Iterations started `elapsed` into the run, the first one at t = 0.
    fn due_at(&self, elapsed: Duration) -> u64 {
        let total = self.total_iterations();
        if total == 0 {
            return 0;
        }
        let started = elapsed.as_secs_f64() / self.time_unit.as_secs_f64() * f64::from(self.rate);
        (started.floor() as u64 + 1).min(total)
    }

    fn total_iterations(&self) -> u64 {
        if self.time_unit.is_zero() {
            return 0;
        }
        (self.duration.as_secs_f64() / self.time_unit.as_secs_f64() * f64::from(self.rate)).floor() as u64
    }

    fn tick(&self) -> Duration {
        if self.rate == 0 {
            return self.duration.max(MIN_TICK);
        }
        (self.time_unit / self.rate).max(MIN_TICK)
    }
}

pub(crate) async fn run(
    scenario: &str,
    ctx: VuContext,
    entrypoint: Entrypoint,
    shape: ArrivalRate,
    mut cancel: watch::Receiver<bool>,
) {
    if shape.pre_allocated_vus > shape.max_vus {
        warn!(
            scenario,
            pre_allocated_vus = shape.pre_allocated_vus,
            max_vus = shape.max_vus,
            "pre_allocated_vus exceeds max_vus, raising the cap"
        );
    }
    let max_vus = shape.max_vus.max(shape.pre_allocated_vus);
    let mut allocated = shape.pre_allocated_vus;
    let semaphore = Arc::new(Semaphore::new(allocated as usize));
    let states: Arc<Mutex<Vec<VuState>>> =
        Arc::new(Mutex::new((1..=u64::from(allocated)).map(VuState::new).collect()));
    ctx.metrics.adjust_gauge(names::VUS_MAX, i64::from(allocated));

    let mut ticker = tokio::time::interval(shape.tick());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(
        scenario,
        rate = shape.rate,
        time_unit = ?shape.time_unit,
        duration = ?shape.duration,
        pre_allocated_vus = shape.pre_allocated_vus,
        max_vus,
        "Arrival rate started"
    );

    let started = Instant::now();
    let mut launched = 0u64;
    let mut dropped = 0u64;
    let mut cancelled = false;

    loop {
        tokio::select! {
            _ = ticker.tick() => {},
            () = signalled(&mut cancel) => {
                cancelled = true;
                break;
            },
        }

        let elapsed = started.elapsed();
        let due = shape.due_at(elapsed.min(shape.duration));

        while launched < due {
            launched += 1;

            let permit = match semaphore.clone().try_acquire_owned() {
                Ok(permit) => permit,
                Err(_) if allocated < max_vus => {
                    allocated += 1;
                    semaphore.add_permits(1);
                    ctx.metrics.adjust_gauge(names::VUS_MAX, 1);
                    debug!(scenario, allocated, "Growing VU pool");
                    match semaphore.clone().try_acquire_owned() {
                        Ok(permit) => permit,
                        Err(_) => continue,
                    }
                },
                Err(_) => {
                    dropped += 1;
                    ctx.metrics.increment(names::DROPPED_ITERATIONS, 1);
                    if dropped == 1 {
                        warn!(scenario, max_vus, "VU pool exhausted, dropping iterations");
                    }
                    continue;
                },
            };

            let ctx = ctx.clone();
            let states = states.clone();
            let id = launched;
            tokio::spawn(async move {
                let _permit = permit;
                let mut state = states.lock().pop().unwrap_or_else(|| VuState::new(id));
                ctx.metrics.adjust_gauge(names::VUS, 1);

                let started = Instant::now();
                run_iteration(&ctx, entrypoint, &mut state).await;
                record_iteration(&ctx.metrics, started);

                ctx.metrics.adjust_gauge(names::VUS, -1);
                states.lock().push(state);
            });
        }

        if elapsed >= shape.duration {
            break;
        }
    }

    // in-flight iterations hold permits; sends are never aborted
    let _ = semaphore.acquire_many(allocated).await;
    ctx.metrics.adjust_gauge(names::VUS_MAX, -i64::from(allocated));

    if dropped > 0 {
        warn!(scenario, dropped, launched, "Iterations dropped, VU pool too small for the rate");
    }
    info!(scenario, launched, dropped, cancelled, "Arrival rate finished");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape(rate: u32, duration: Duration) -> ArrivalRate {
        ArrivalRate {
            rate,
            time_unit: Duration::from_secs(1),
            duration,
            pre_allocated_vus: 1,
            max_vus: 1,
        }
    }

    #[test]
    fn test_due_schedule() {
        let shape = shape(10, Duration::from_secs(2));
        assert_eq!(shape.total_iterations(), 20);
        assert_eq!(shape.due_at(Duration::ZERO), 1);
        assert_eq!(shape.due_at(Duration::from_millis(150)), 2);
        assert_eq!(shape.due_at(Duration::from_secs(2)), 20);
        assert_eq!(shape.tick(), Duration::from_millis(100));
    }

    #[test]
    fn test_high_rate_tick_is_bounded() {
        let shape = shape(10_000, Duration::from_secs(120));
        assert_eq!(shape.tick(), MIN_TICK);
        assert_eq!(shape.total_iterations(), 1_200_000);
    }

    #[test]
    fn test_zero_rate() {
        let shape = shape(0, Duration::from_secs(1));
        assert_eq!(shape.due_at(Duration::from_secs(1)), 0);
    }
}
