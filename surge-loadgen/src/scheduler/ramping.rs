//! `ramping-vus` executor: a controller tracks the interpolated target.

use super::{signalled, vu::VuContext, vu::VuPool};
use crate::metrics::names;
use crate::scenarios::{Entrypoint, Executor};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

pub(crate) async fn run(
    scenario: &str,
    ctx: VuContext,
    entrypoint: Entrypoint,
    executor: &Executor,
    granularity: Duration,
    mut cancel: watch::Receiver<bool>,
) {
    let total = executor.total_duration();
    let allocated = i64::from(executor.max_vus());
    let metrics = ctx.metrics.clone();
    metrics.adjust_gauge(names::VUS_MAX, allocated);

    let mut pool = VuPool::new(ctx, entrypoint, scenario);
    let mut ticker = tokio::time::interval(granularity.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(scenario, ?total, max_vus = allocated, "Ramping VUs started");

    let started = Instant::now();
    let mut cancelled = false;
    loop {
        let elapsed = started.elapsed();
        if elapsed >= total {
            break;
        }

        let target = executor.target_vus_at(elapsed) as usize;
        if target != pool.len() {
            debug!(scenario, ?elapsed, from = pool.len(), to = target, "Adjusting VUs");
            pool.scale_to(target);
        }

        tokio::select! {
            _ = ticker.tick() => {},
            () = signalled(&mut cancel) => {
                cancelled = true;
                break;
            },
        }
    }

    pool.shutdown().await;
    metrics.adjust_gauge(names::VUS_MAX, -allocated);
    info!(scenario, cancelled, "Ramping VUs finished");
}
