//! `constant-vus` executor.

use super::{sleep_or_cancel, vu::VuPool, vu::VuContext};
use crate::metrics::names;
use crate::scenarios::Entrypoint;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;

pub(crate) async fn run(
    scenario: &str,
    ctx: VuContext,
    entrypoint: Entrypoint,
    vus: u32,
    duration: Duration,
    mut cancel: watch::Receiver<bool>,
) {
    let metrics = ctx.metrics.clone();
    metrics.adjust_gauge(names::VUS_MAX, i64::from(vus));

    let mut pool = VuPool::new(ctx, entrypoint, scenario);
    pool.scale_to(vus as usize);
    info!(scenario, vus, ?duration, "Constant VUs started");

    let cancelled = sleep_or_cancel(duration, &mut cancel).await;
    pool.shutdown().await;

    metrics.adjust_gauge(names::VUS_MAX, -i64::from(vus));
    info!(scenario, cancelled, "Constant VUs finished");
}
