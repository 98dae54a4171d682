//! Per-iteration behaviour of each scenario.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;
use surge_core::MessageId;

/// Number of recently sent ids a VU remembers for duplicate re-sends.
pub const RECENT_IDS_CAPACITY: usize = 64;

/// Function a VU runs on every iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Entrypoint {
    /// One message, then a one second pause
    Smoke,
    /// Mostly single messages with occasional batches of 10-50
    Load,
    /// Even mix of single messages and batches of 50-200
    Stress,
    /// Back-to-back sends with occasional batches of 100-500
    Spike,
    /// One message per arrival-rate iteration
    MaxThroughput,
}

/// One produce call planned for an iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendKind {
    /// A single generated message
    Single,
    /// A batch of generated messages
    Batch(usize),
}

impl SendKind {
    /// Messages covered by the call.
    #[must_use]
    pub const fn messages(self) -> usize {
        match self {
            Self::Single => 1,
            Self::Batch(n) => n,
        }
    }
}

/// What one iteration does, decided up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterationPlan {
    /// Produce calls, in order
    pub sends: Vec<SendKind>,
    /// Pause after the sends
    pub pause: Option<Duration>,
}

impl Entrypoint {
    /// Name used in tags and reports.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Smoke => "smoke",
            Self::Load => "load",
            Self::Stress => "stress",
            Self::Spike => "spike",
            Self::MaxThroughput => "max-throughput",
        }
    }

    /// Draw the plan of the next iteration.
    pub fn plan<R: Rng + ?Sized>(self, rng: &mut R) -> IterationPlan {
        match self {
            Self::Smoke => IterationPlan {
                sends: vec![SendKind::Single],
                pause: Some(Duration::from_secs(1)),
            },
            Self::Load => {
                let send = if rng.gen_bool(0.7) {
                    SendKind::Single
                } else {
                    SendKind::Batch(rng.gen_range(10..=50))
                };
                IterationPlan { sends: vec![send], pause: Some(tenths(rng, 1..=3)) }
            },
            Self::Stress => {
                let send = if rng.gen_bool(0.5) {
                    SendKind::Single
                } else {
                    SendKind::Batch(rng.gen_range(50..=200))
                };
                IterationPlan { sends: vec![send], pause: Some(tenths(rng, 1..=2)) }
            },
            Self::Spike => {
                let mut sends = vec![SendKind::Single];
                if rng.gen_bool(0.3) {
                    sends.push(SendKind::Batch(rng.gen_range(100..=500)));
                }
                IterationPlan { sends, pause: None }
            },
            Self::MaxThroughput => IterationPlan { sends: vec![SendKind::Single], pause: None },
        }
    }
}

impl fmt::Display for Entrypoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn tenths<R: Rng + ?Sized>(rng: &mut R, range: std::ops::RangeInclusive<u64>) -> Duration {
    Duration::from_millis(rng.gen_range(range) * 100)
}

/// Bounded memory of the ids a VU sent most recently.
#[derive(Debug, Clone, Default)]
pub struct RecentIds {
    ids: VecDeque<MessageId>,
}

impl RecentIds {
    /// Remember `id`, forgetting the oldest one when full.
    pub fn remember(&mut self, id: MessageId) {
        if self.ids.len() == RECENT_IDS_CAPACITY {
            self.ids.pop_front();
        }
        self.ids.push_back(id);
    }

    /// A uniformly chosen remembered id.
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&MessageId> {
        if self.ids.is_empty() {
            return None;
        }
        self.ids.get(rng.gen_range(0..self.ids.len()))
    }

    /// Number of remembered ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether nothing has been sent yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
