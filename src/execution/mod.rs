pub mod executor;
pub mod handlers;
pub mod reference;
pub mod retry;
pub mod state;

pub use executor::Executor;
pub use handlers::{HandlerRegistry, HandlerServices, StepContext, StepHandler};
pub use reference::{ReferenceScope, ResolvedArguments, resolve_arguments};
pub use retry::{RetryPolicy, is_retryable_message};
pub use state::{
    Execution, ExecutionOutcome, ExecutionStatus, ExecutionSummary, ProgressEvent, StepOutcome,
    StepResult,
};
