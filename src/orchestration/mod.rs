pub mod agent_types;
pub mod aggregate;
pub mod orchestrator;
pub mod registry;
pub mod selection;
pub mod task;

pub use agent_types::{AGENT_CATALOG, AgentType, AgentTypeInfo};
pub use aggregate::{AggregatedResult, Synthesis, aggregate_results};
pub use orchestrator::{OrchestrationOutcome, Orchestrator};
pub use registry::{AgentInfo, AgentRegistry, AgentRequest, AgentRuntime, AgentStatus, RegistryConfig};
pub use selection::{SelectedAgent, fallback_selection, select_agents};
pub use task::{AgentTask, TaskProgressEvent, TaskResult, TaskStatus, build_tasks};
