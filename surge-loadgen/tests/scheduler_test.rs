//! Executor timing on a paused clock.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use surge_core::{config::SimulationSection, EventType, Topic};
use surge_loadgen::metrics::{names, MetricSummary, MetricsRegistry};
use surge_loadgen::scenarios::{catalog, Entrypoint, Executor, PlanBuilder, Scenario, Stage};
use surge_loadgen::scheduler::{run_iteration, RunStatus, Scheduler, VuContext, VuState};
use surge_publisher::{codec::decode_record, ProducerAdapter, SimulatedBroker};
use tokio::sync::watch;

fn context(broker: Arc<SimulatedBroker>, duplicate_ratio: f64) -> VuContext {
    let producer = Arc::new(ProducerAdapter::new(broker, Topic::new("orders").unwrap()));
    VuContext::new(producer, Arc::new(MetricsRegistry::new()), duplicate_ratio)
}

fn scenario(name: &str, executor: Executor, entrypoint: Entrypoint) -> Scenario {
    Scenario {
        name: name.to_string(),
        executor,
        entrypoint,
        tags: BTreeMap::new(),
        start_offset: Duration::ZERO,
    }
}

fn slow_broker(latency: Duration) -> SimulatedBroker {
    SimulatedBroker::new(&SimulationSection { min_latency: latency, max_latency: latency, failure_ratio: 0.0 })
}

async fn run_plan(ctx: &VuContext, scenarios: Vec<Scenario>) -> RunStatus {
    let plan = PlanBuilder::parallel().scenarios(scenarios).build();
    let (_cancel, cancel_rx) = watch::channel(false);
    Scheduler::new(ctx.clone(), Duration::from_millis(100)).run(&plan, cancel_rx).await
}

#[tokio::test(start_paused = true)]
async fn test_smoke_runs_one_vu_for_thirty_seconds() {
    let ctx = context(Arc::new(SimulatedBroker::instant()), 0.0);
    let started = tokio::time::Instant::now();

    let status = run_plan(&ctx, vec![catalog::smoke()]).await;

    assert_eq!(status, RunStatus::Completed);
    assert!(started.elapsed() >= Duration::from_secs(30));

    let snapshot = ctx.metrics.snapshot();
    let iterations = snapshot.counter(names::ITERATIONS);
    assert!((30..=31).contains(&iterations), "iterations = {iterations}");
    assert_eq!(snapshot.counter(names::MESSAGES_SENT), iterations);
    assert_eq!(snapshot.get(names::VUS), Some(&MetricSummary::Gauge { value: 0, max: 1 }));
}

#[tokio::test(start_paused = true)]
async fn test_ramping_reaches_target_and_drains() {
    let ctx = context(Arc::new(SimulatedBroker::instant()), 0.0);
    let ramp = scenario(
        "ramp",
        Executor::RampingVus {
            start_vus: 0,
            stages: vec![
                Stage::new(Duration::from_secs(1), 4),
                Stage::new(Duration::from_secs(2), 4),
                Stage::new(Duration::from_secs(1), 0),
            ],
        },
        Entrypoint::Smoke,
    );

    assert_eq!(run_plan(&ctx, vec![ramp]).await, RunStatus::Completed);

    let snapshot = ctx.metrics.snapshot();
    assert_eq!(snapshot.get(names::VUS), Some(&MetricSummary::Gauge { value: 0, max: 4 }));
    assert_eq!(snapshot.get(names::VUS_MAX), Some(&MetricSummary::Gauge { value: 0, max: 4 }));
    assert!(snapshot.counter(names::ITERATIONS) >= 4);
}

#[tokio::test(start_paused = true)]
async fn test_arrival_rate_is_independent_of_vus() {
    let ctx = context(Arc::new(SimulatedBroker::instant()), 0.0);
    let arrival = scenario(
        "arrival",
        Executor::ConstantArrivalRate {
            rate: 10,
            time_unit: Duration::from_secs(1),
            duration: Duration::from_secs(2),
            pre_allocated_vus: 2,
            max_vus: 5,
        },
        Entrypoint::MaxThroughput,
    );

    run_plan(&ctx, vec![arrival]).await;

    let snapshot = ctx.metrics.snapshot();
    assert_eq!(snapshot.counter(names::ITERATIONS), 20);
    assert_eq!(snapshot.counter(names::MESSAGES_SENT), 20);
    assert_eq!(snapshot.counter(names::DROPPED_ITERATIONS), 0);
}

#[tokio::test(start_paused = true)]
async fn test_arrival_rate_drops_when_pool_exhausted() {
    let ctx = context(Arc::new(slow_broker(Duration::from_secs(5))), 0.0);
    let arrival = scenario(
        "arrival",
        Executor::ConstantArrivalRate {
            rate: 100,
            time_unit: Duration::from_secs(1),
            duration: Duration::from_secs(1),
            pre_allocated_vus: 1,
            max_vus: 2,
        },
        Entrypoint::MaxThroughput,
    );

    run_plan(&ctx, vec![arrival]).await;

    let snapshot = ctx.metrics.snapshot();
    assert_eq!(snapshot.counter(names::ITERATIONS), 2);
    assert_eq!(snapshot.counter(names::DROPPED_ITERATIONS), 98);
    assert_eq!(snapshot.get(names::VUS_MAX), Some(&MetricSummary::Gauge { value: 0, max: 2 }));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_stops_plan_early() {
    let ctx = context(Arc::new(SimulatedBroker::instant()), 0.0);
    let plan = PlanBuilder::sequential(Duration::from_secs(5))
        .scenario(catalog::load())
        .scenario(catalog::smoke())
        .build();
    let (cancel, cancel_rx) = watch::channel(false);

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(10)).await;
        let _ = cancel.send(true);
    });

    let started = tokio::time::Instant::now();
    let status = Scheduler::new(ctx.clone(), Duration::from_millis(100)).run(&plan, cancel_rx).await;

    assert_eq!(status, RunStatus::Cancelled);
    assert!(started.elapsed() < Duration::from_secs(60));
    let snapshot = ctx.metrics.snapshot();
    assert!(matches!(snapshot.get(names::VUS), Some(MetricSummary::Gauge { value: 0, .. })));
    assert!(snapshot.counter(names::ITERATIONS) > 0);
}

#[tokio::test]
async fn test_duplicate_injection_reuses_sent_ids() {
    let broker = Arc::new(SimulatedBroker::instant().with_capture());
    let ctx = context(broker.clone(), 1.0);
    let mut state = VuState::new(1);

    let pause = run_iteration(&ctx, Entrypoint::Smoke, &mut state).await;
    assert_eq!(pause, Some(Duration::from_secs(1)));

    let accepted = broker.accepted();
    assert_eq!(accepted.len(), 2);
    let original = decode_record(&accepted[0].records[0]).unwrap();
    let duplicate = decode_record(&accepted[1].records[0]).unwrap();

    assert_eq!(original.event_type, EventType::LoadTest);
    assert_eq!(duplicate.event_type, EventType::DuplicateTest);
    assert_eq!(duplicate.message_id, original.message_id);
    assert_eq!(duplicate.correlation_id, format!("dup-{}", original.message_id));

    let snapshot = ctx.metrics.snapshot();
    assert_eq!(snapshot.counter(names::MESSAGES_DUPLICATED), 1);
    assert_eq!(snapshot.counter(names::MESSAGES_SENT), 2);
}

#[tokio::test]
async fn test_failed_sends_are_counted_per_message() {
    let broker = Arc::new(SimulatedBroker::new(&SimulationSection {
        min_latency: Duration::ZERO,
        max_latency: Duration::ZERO,
        failure_ratio: 1.0,
    }));
    let ctx = context(broker, 0.0);
    let mut state = VuState::new(1);

    for _ in 0..5 {
        run_iteration(&ctx, Entrypoint::Stress, &mut state).await;
    }

    let snapshot = ctx.metrics.snapshot();
    assert!(snapshot.counter(names::MESSAGES_FAILED) >= 5);
    assert_eq!(snapshot.counter(names::MESSAGES_SENT), 0);
    assert_eq!(snapshot.rate(names::SUCCESS_RATE), Some(0.0));
    assert!(state.recent().is_empty());
}
