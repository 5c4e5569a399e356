#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CopilotError {
    #[error("parse error: {0}")]
    ParseError(String),

    #[error("no function identified")]
    NoFunctionIdentified,

    #[error("plan validation failed: {}", .0.join("; "))]
    PlanValidation(Vec<String>),

    #[error("step {0} timed out")]
    StepTimeout(String),

    #[error("agent not found: {0}")]
    AgentNotFound(String),

    #[error("agent execution failed: {0}")]
    AgentExecution(String),

    #[error("model error: {0}")]
    Model(String),

    #[error("collaborator error: {0}")]
    Collaborator(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("execution cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    InternalError(String),
}
