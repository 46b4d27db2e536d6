//! Migration steps and planning.

pub mod context;
pub mod planner;
pub mod step;

pub use context::MigrationContext;
pub use planner::{Planner, StaticPlan, UpgradeHop, UpgradePlanner};
pub use step::{Step, StepStatus};
