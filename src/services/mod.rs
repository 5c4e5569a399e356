pub mod action;
pub mod store;
pub mod workflow;

pub use action::{ActionExecutor, CHAT_INTENT, DetectedIntent, KeywordActionExecutor};
pub use store::{
    BACKUP_FUNCTION, ExecutionLogEntry, ExecutionLogStore, InMemoryExecutionLogStore,
    InMemorySuggestionStore, SuggestionStore,
};
pub use workflow::{InMemoryWorkflowService, WorkflowService};
