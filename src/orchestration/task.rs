use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    orchestration::{agent_types::AgentType, selection::SelectedAgent},
    planning::StepPriority,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Completed,
    Failed,
}

/// One agent's share of an orchestrated command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentTask {
    pub id: String,
    pub agent: AgentType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    pub role: String,
    pub command: String,
    pub confidence: f64,
    pub can_parallel: bool,
    pub dependencies: Vec<String>,
    pub status: TaskStatus,
    pub priority: StepPriority,
}

impl AgentTask {
    fn from_agent(id: String, agent: &SelectedAgent, command: &str, dependencies: Vec<String>) -> Self {
        let role = if agent.role.is_empty() { agent.reason.clone() } else { agent.role.clone() };
        Self {
            id,
            agent: agent.agent_type,
            agent_id: agent.agent_id.clone(),
            role,
            command: command.to_string(),
            confidence: agent.confidence,
            can_parallel: agent.can_parallel,
            dependencies,
            status: TaskStatus::Pending,
            priority: if agent.confidence > 0.8 {
                StepPriority::High
            } else {
                StepPriority::Medium
            },
        }
    }
}

/// Parallel-safe agents become `task-parallel-N` with no dependencies; the
/// rest become `task-sequential-N` gated on `task-parallel-0` when it exists.
pub fn build_tasks(agents: &[SelectedAgent], command: &str) -> Vec<AgentTask> {
    let (parallel, sequential): (Vec<&SelectedAgent>, Vec<&SelectedAgent>) =
        agents.iter().partition(|a| a.can_parallel);

    let gate = if parallel.is_empty() {
        Vec::new()
    } else {
        vec!["task-parallel-0".to_string()]
    };

    let mut tasks: Vec<AgentTask> = parallel
        .iter()
        .enumerate()
        .map(|(i, agent)| AgentTask::from_agent(format!("task-parallel-{}", i), agent, command, Vec::new()))
        .collect();

    tasks.extend(sequential.iter().enumerate().map(|(i, agent)| {
        AgentTask::from_agent(format!("task-sequential-{}", i), agent, command, gate.clone())
    }));

    tasks
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResult {
    pub task_id: String,
    pub agent: AgentType,
    pub status: TaskStatus,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub completed_at: DateTime<Utc>,
}

impl TaskResult {
    pub fn completed(task: &AgentTask, result: Value) -> Self {
        Self {
            task_id: task.id.clone(),
            agent: task.agent,
            status: TaskStatus::Completed,
            result: Some(result),
            error: None,
            completed_at: Utc::now(),
        }
    }

    pub fn failed(task: &AgentTask, error: impl Into<String>) -> Self {
        Self {
            task_id: task.id.clone(),
            agent: task.agent,
            status: TaskStatus::Failed,
            result: None,
            error: Some(error.into()),
            completed_at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == TaskStatus::Completed && self.result.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskProgress {
    pub completed: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskProgressEvent {
    pub task: String,
    pub agent: AgentType,
    pub status: TaskStatus,
    pub progress: TaskProgress,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_tasks_wait_for_the_first_parallel_task() {
        let agents = vec![
            SelectedAgent::new(AgentType::SeoSpecialist, 0.9, "seo", "Optimize"),
            SelectedAgent::new(AgentType::WorkflowAutomation, 0.9, "flow", "").sequential(),
            SelectedAgent::new(AgentType::ContentCreator, 0.8, "write", "Write"),
        ];

        let tasks = build_tasks(&agents, "launch campaign");
        let ids: Vec<_> = tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["task-parallel-0", "task-parallel-1", "task-sequential-0"]);
        assert_eq!(tasks[2].dependencies, vec!["task-parallel-0"]);
        assert_eq!(tasks[2].role, "flow");
        assert_eq!(tasks[0].priority, StepPriority::High);
        assert_eq!(tasks[1].priority, StepPriority::Medium);
    }

    #[test]
    fn sequential_only_tasks_have_no_gate() {
        let agents = vec![SelectedAgent::new(AgentType::WorkflowAutomation, 0.9, "flow", "Build").sequential()];
        let tasks = build_tasks(&agents, "automate");
        assert_eq!(tasks[0].id, "task-sequential-0");
        assert!(tasks[0].dependencies.is_empty());
    }
}
