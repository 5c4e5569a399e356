pub mod instantiate;
pub mod model;

pub use instantiate::default_catalog;
pub use model::{FunctionSpec, find_function};
