pub mod decompose;
pub mod duration;
pub mod graph;
pub mod plan;
pub mod planner;
pub mod step;

pub use graph::{ValidationReport, validate};
pub use plan::{DecompositionSource, ParallelGroup, Plan, PlanMetadata, PlanOutcome};
pub use planner::Planner;
pub use step::{Step, StepPriority};
