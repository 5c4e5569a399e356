pub mod model;
pub mod provider;

pub use model::{BusinessContext, ExecutionRef, ProjectRef, WorkflowRef};
pub use provider::{CachedContextProvider, ContextProvider, ContextSource, StaticContextSource};
