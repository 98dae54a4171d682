//! Built-in scenarios, scenario selection and run plans.

use super::{Entrypoint, Executor, Stage};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::warn;

/// Scenario run when the selector is not recognised.
pub const FALLBACK_SCENARIO: &str = "load";

/// Selector that chains every built-in scenario.
pub const ALL_SCENARIOS: &str = "all";

/// A named traffic shape bound to an entrypoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name
    pub name: String,
    /// Traffic shape
    pub executor: Executor,
    /// Per-iteration behaviour
    pub entrypoint: Entrypoint,
    /// Free-form tags attached to reports
    pub tags: BTreeMap<String, String>,
    /// Delay from the start of the run
    #[serde(with = "humantime_serde")]
    pub start_offset: Duration,
}

impl Scenario {
    fn new(name: &str, executor: Executor, entrypoint: Entrypoint, test_type: &str) -> Self {
        let mut tags = BTreeMap::new();
        tags.insert("test_type".to_string(), test_type.to_string());
        Self {
            name: name.to_string(),
            executor,
            entrypoint,
            tags,
            start_offset: Duration::ZERO,
        }
    }

    /// When the scenario finishes, relative to the start of the run.
    #[must_use]
    pub fn end_offset(&self) -> Duration {
        self.start_offset + self.executor.total_duration()
    }
}

const fn secs(s: u64) -> Duration {
    Duration::from_secs(s)
}

const fn mins(m: u64) -> Duration {
    Duration::from_secs(m * 60)
}

/// One VU for 30 seconds.
#[must_use]
pub fn smoke() -> Scenario {
    Scenario::new(
        "smoke",
        Executor::ConstantVus { vus: 1, duration: secs(30) },
        Entrypoint::Smoke,
        "smoke",
    )
}

/// Ramp to 10 VUs, hold, ramp down.
#[must_use]
pub fn load() -> Scenario {
    Scenario::new(
        "load",
        Executor::RampingVus {
            start_vus: 0,
            stages: vec![Stage::new(mins(1), 10), Stage::new(mins(3), 10), Stage::new(mins(1), 0)],
        },
        Entrypoint::Load,
        "load",
    )
}

/// Ramp to 50 VUs, hold, push to 100, ramp down.
#[must_use]
pub fn stress() -> Scenario {
    Scenario::new(
        "stress",
        Executor::RampingVus {
            start_vus: 0,
            stages: vec![
                Stage::new(mins(2), 50),
                Stage::new(mins(5), 50),
                Stage::new(mins(2), 100),
                Stage::new(mins(1), 0),
            ],
        },
        Entrypoint::Stress,
        "stress",
    )
}

/// Jump to 100 VUs in ten seconds, hold a minute, drop.
#[must_use]
pub fn spike() -> Scenario {
    Scenario::new(
        "spike",
        Executor::RampingVus {
            start_vus: 0,
            stages: vec![Stage::new(secs(10), 100), Stage::new(mins(1), 100), Stage::new(secs(10), 0)],
        },
        Entrypoint::Spike,
        "spike",
    )
}

/// 10 000 iterations per second for two minutes.
#[must_use]
pub fn max_throughput() -> Scenario {
    Scenario::new(
        "max",
        Executor::ConstantArrivalRate {
            rate: 10_000,
            time_unit: secs(1),
            duration: mins(2),
            pre_allocated_vus: 50,
            max_vus: 200,
        },
        Entrypoint::MaxThroughput,
        "max-throughput",
    )
}

/// Every built-in scenario in declaration order.
#[must_use]
pub fn catalog() -> Vec<Scenario> {
    vec![smoke(), load(), stress(), spike(), max_throughput()]
}

/// Look up a built-in scenario by name.
#[must_use]
pub fn by_name(name: &str) -> Option<Scenario> {
    catalog().into_iter().find(|s| s.name == name)
}

/// How a plan lays scenarios out in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Composition {
    /// One after another, separated by a gap
    Sequential {
        /// Pause between the end of one scenario and the start of the next
        #[serde(with = "humantime_serde")]
        gap: Duration,
    },
    /// All start at once
    Parallel,
}

/// Scenarios with resolved start offsets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// Scenarios ordered by start offset, ties in declaration order
    pub scenarios: Vec<Scenario>,
}

impl Plan {
    /// Time until the last scenario ends.
    #[must_use]
    pub fn total_duration(&self) -> Duration {
        self.scenarios.iter().map(Scenario::end_offset).max().unwrap_or_default()
    }

    /// Scenario names in run order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.scenarios.iter().map(|s| s.name.as_str()).collect()
    }

    /// Validate every scenario's executor.
    ///
    /// # Errors
    /// Returns the first invalid executor, naming its scenario.
    pub fn validate(&self) -> surge_core::Result<()> {
        for scenario in &self.scenarios {
            scenario.executor.validate().map_err(|e| {
                surge_core::Error::configuration(format!("scenario '{}': {e}", scenario.name))
            })?;
        }
        Ok(())
    }
}

/// Builds a [`Plan`], computing each scenario's start offset.
#[derive(Debug, Clone)]
pub struct PlanBuilder {
    scenarios: Vec<Scenario>,
    composition: Composition,
}

impl PlanBuilder {
    /// Sequential composition with the given gap.
    #[must_use]
    pub fn sequential(gap: Duration) -> Self {
        Self { scenarios: Vec::new(), composition: Composition::Sequential { gap } }
    }

    /// Parallel composition.
    #[must_use]
    pub fn parallel() -> Self {
        Self { scenarios: Vec::new(), composition: Composition::Parallel }
    }

    /// Append a scenario.
    #[must_use]
    pub fn scenario(mut self, scenario: Scenario) -> Self {
        self.scenarios.push(scenario);
        self
    }

    /// Append several scenarios.
    #[must_use]
    pub fn scenarios(mut self, scenarios: impl IntoIterator<Item = Scenario>) -> Self {
        self.scenarios.extend(scenarios);
        self
    }

    /// Resolve offsets.
    #[must_use]
    pub fn build(self) -> Plan {
        let mut scenarios = self.scenarios;
        match self.composition {
            Composition::Parallel => {
                for scenario in &mut scenarios {
                    scenario.start_offset = Duration::ZERO;
                }
            },
            Composition::Sequential { gap } => {
                let mut next = Duration::ZERO;
                for scenario in &mut scenarios {
                    scenario.start_offset = next;
                    next = scenario.end_offset() + gap;
                }
            },
        }
        // stable: equal offsets keep declaration order
        scenarios.sort_by_key(|s| s.start_offset);
        Plan { scenarios }
    }
}

/// Outcome of resolving a scenario selector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    /// Selector as given
    pub requested: String,
    /// Plan to run
    pub plan: Plan,
    /// Whether the selector was unknown and the fallback scenario was used
    pub fallback: bool,
}

/// Resolve `selector` (`smoke|load|stress|spike|max|all`) into a plan.
///
/// An unknown selector is not an error: it runs [`FALLBACK_SCENARIO`] and flags the
/// selection so the banner and summary can say so.
#[must_use]
pub fn select(selector: &str, gap: Duration) -> Selection {
    let requested = selector.trim().to_string();
    let key = requested.to_ascii_lowercase();

    if key == ALL_SCENARIOS {
        let plan = PlanBuilder::sequential(gap).scenarios(catalog()).build();
        return Selection { requested, plan, fallback: false };
    }

    let (scenario, fallback) = match by_name(&key) {
        Some(scenario) => (scenario, false),
        None => {
            warn!(
                requested = %requested,
                fallback = FALLBACK_SCENARIO,
                "Unknown scenario selector, running the fallback scenario"
            );
            (load(), true)
        },
    };

    let plan = PlanBuilder::sequential(gap).scenario(scenario).build();
    Selection { requested, plan, fallback }
}
