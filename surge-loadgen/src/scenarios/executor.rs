//! Traffic shapes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// One leg of a ramping shape: move linearly to `target` VUs over `duration`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    /// Length of the leg
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
    /// VU count reached at the end of the leg
    pub target: u32,
}

impl Stage {
    /// Shorthand constructor.
    #[must_use]
    pub const fn new(duration: Duration, target: u32) -> Self {
        Self { duration, target }
    }
}

/// How iterations are scheduled over time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "executor", rename_all = "kebab-case")]
pub enum Executor {
    /// A fixed number of VUs loop for the whole duration.
    ConstantVus {
        /// Concurrent VUs
        vus: u32,
        /// Run length
        #[serde(with = "humantime_serde")]
        duration: Duration,
    },
    /// The VU count follows a piecewise-linear curve through `stages`.
    RampingVus {
        /// VU count at t = 0
        start_vus: u32,
        /// Consecutive legs
        stages: Vec<Stage>,
    },
    /// `rate` new iterations per `time_unit`, whatever the iteration latency.
    ConstantArrivalRate {
        /// Iterations started per `time_unit`
        rate: u32,
        /// Rate period
        #[serde(with = "humantime_serde")]
        time_unit: Duration,
        /// Run length
        #[serde(with = "humantime_serde")]
        duration: Duration,
        /// VUs allocated up front
        pre_allocated_vus: u32,
        /// Upper bound the pool may grow to
        max_vus: u32,
    },
}

impl Executor {
    /// Executor name as shown in reports.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ConstantVus { .. } => "constant-vus",
            Self::RampingVus { .. } => "ramping-vus",
            Self::ConstantArrivalRate { .. } => "constant-arrival-rate",
        }
    }

    /// Check the shape's invariants.
    ///
    /// # Errors
    /// Returns a configuration error for an arrival-rate shape whose pre-allocated pool
    /// exceeds `max_vus`, or whose rate or time unit is zero.
    pub fn validate(&self) -> surge_core::Result<()> {
        if let Self::ConstantArrivalRate { rate, time_unit, pre_allocated_vus, max_vus, .. } = self {
            if pre_allocated_vus > max_vus {
                return Err(surge_core::Error::configuration(format!(
                    "pre_allocated_vus ({pre_allocated_vus}) exceeds max_vus ({max_vus})"
                )));
            }
            if *rate == 0 || time_unit.is_zero() {
                return Err(surge_core::Error::configuration("arrival rate and time unit must be positive"));
            }
        }
        Ok(())
    }

    /// Total run length of the shape.
    #[must_use]
    pub fn total_duration(&self) -> Duration {
        match self {
            Self::ConstantVus { duration, .. } | Self::ConstantArrivalRate { duration, .. } => *duration,
            Self::RampingVus { stages, .. } => stages.iter().map(|s| s.duration).sum(),
        }
    }

    /// Highest number of VUs the shape can need at once.
    #[must_use]
    pub fn max_vus(&self) -> u32 {
        match self {
            Self::ConstantVus { vus, .. } => *vus,
            Self::RampingVus { start_vus, stages } => {
                stages.iter().map(|s| s.target).fold(*start_vus, u32::max)
            },
            Self::ConstantArrivalRate { pre_allocated_vus, max_vus, .. } => {
                (*max_vus).max(*pre_allocated_vus)
            },
        }
    }

    /// Target concurrency `elapsed` into the run, as a real number.
    ///
    /// Constant VUs return their count for the whole run; arrival-rate shapes are not
    /// concurrency driven and return 0. Past the end every shape returns 0.
    #[must_use]
    pub fn target_at(&self, elapsed: Duration) -> f64 {
        match self {
            Self::ConstantVus { vus, duration } => {
                if elapsed < *duration {
                    f64::from(*vus)
                } else {
                    0.0
                }
            },
            Self::RampingVus { start_vus, stages } => ramping_target_at(*start_vus, stages, elapsed),
            Self::ConstantArrivalRate { .. } => 0.0,
        }
    }

    /// [`target_at`](Self::target_at) rounded to whole VUs.
    #[must_use]
    pub fn target_vus_at(&self, elapsed: Duration) -> u32 {
        self.target_at(elapsed).round() as u32
    }
}

impl fmt::Display for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Piecewise-linear interpolation through `stages`, starting from `start_vus`.
///
/// A stage boundary belongs to the following stage. Zero-length stages jump straight to
/// their target. After the last stage the value is 0.
#[must_use]
pub fn ramping_target_at(start_vus: u32, stages: &[Stage], elapsed: Duration) -> f64 {
    let mut from = f64::from(start_vus);
    let mut stage_start = Duration::ZERO;

    for stage in stages {
        let stage_end = stage_start + stage.duration;
        let to = f64::from(stage.target);
        if elapsed < stage_end {
            let progress = (elapsed - stage_start).as_secs_f64() / stage.duration.as_secs_f64();
            return from + (to - from) * progress;
        }
        from = to;
        stage_start = stage_end;
    }

    0.0
}
