//! Scenario definitions: traffic shapes, per-iteration behaviour and run plans.

pub mod catalog;
pub mod entrypoint;
pub mod executor;

pub use catalog::{select, PlanBuilder, Plan, Scenario, Selection};
pub use entrypoint::{Entrypoint, IterationPlan, RecentIds, SendKind};
pub use executor::{Executor, Stage};
