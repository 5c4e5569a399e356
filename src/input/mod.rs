pub mod model;

pub use model::{
    ExecuteOptions, OrchestrateOptions, ParseOptions, PlanOptions, ProgressCallback,
    TaskProgressCallback,
};
