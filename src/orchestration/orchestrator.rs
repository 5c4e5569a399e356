use std::{panic::AssertUnwindSafe, sync::Arc};

use chrono::{DateTime, Utc};
use futures::{FutureExt, StreamExt, stream::FuturesUnordered};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{debug, error, info, warn};

use crate::{
    context::ContextProvider,
    error::{CopilotError, Result},
    input::{OrchestrateOptions, PlanOptions, TaskProgressCallback},
    llm::{ChatModel, CompletionRequest},
    message::orchestrator::generate_agent_task_messages,
    orchestration::{
        agent_types::AgentType,
        aggregate::{AggregatedResult, aggregate_results},
        registry::{AgentRegistry, AgentRequest},
        selection::{SelectedAgent, select_agents},
        task::{AgentTask, TaskProgress, TaskProgressEvent, TaskResult, build_tasks},
    },
    parser::ParsedCall,
    planning::{Plan, Planner},
    services::ActionExecutor,
};

pub const NO_AGENTS_ERROR: &str = "No suitable agents found for this command";
pub const NO_AGENTS_SUGGESTION: &str = "Try rephrasing your command or check available agents";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSummary {
    #[serde(rename = "type")]
    pub agent_type: AgentType,
    pub confidence: f64,
    pub reason: String,
}

impl From<&SelectedAgent> for AgentSummary {
    fn from(agent: &SelectedAgent) -> Self {
        Self {
            agent_type: agent.agent_type,
            confidence: agent.confidence,
            reason: agent.reason.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestrationMetadata {
    pub total_agents: usize,
    pub successful_agents: usize,
    pub failed_agents: usize,
    pub orchestrated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestrationOutcome {
    pub success: bool,
    pub command: String,
    pub selected_agents: Vec<AgentSummary>,
    pub plan: Option<Plan>,
    pub results: Option<AggregatedResult>,
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<OrchestrationMetadata>,
}

impl OrchestrationOutcome {
    fn no_agents(command: &str) -> Self {
        Self {
            success: false,
            command: command.to_string(),
            selected_agents: Vec::new(),
            plan: None,
            results: None,
            summary: None,
            error: Some(NO_AGENTS_ERROR.to_string()),
            suggestion: Some(NO_AGENTS_SUGGESTION.to_string()),
            metadata: None,
        }
    }
}

/// Alternate entry point: picks specialised agents instead of parsing
/// functions, runs their tasks and merges the output.
pub struct Orchestrator {
    model: Arc<dyn ChatModel>,
    context: Arc<dyn ContextProvider>,
    registry: Arc<AgentRegistry>,
    actions: Arc<dyn ActionExecutor>,
    planner: Planner,
}

impl Orchestrator {
    pub fn new(
        model: Arc<dyn ChatModel>,
        context: Arc<dyn ContextProvider>,
        registry: Arc<AgentRegistry>,
        actions: Arc<dyn ActionExecutor>,
    ) -> Self {
        Self {
            planner: Planner::new(model.clone(), context.clone()),
            model,
            context,
            registry,
            actions,
        }
    }

    pub async fn orchestrate(&self, command: &str, options: &OrchestrateOptions) -> OrchestrationOutcome {
        let context = self.context.load().await;

        let selected = select_agents(
            self.model.as_ref(),
            &self.registry,
            command,
            options.project_id.as_deref(),
        )
        .await;
        if selected.is_empty() {
            warn!("no agents selected for \"{}\"", command);
            return OrchestrationOutcome::no_agents(command);
        }
        info!(
            "selected agents: {}",
            selected.iter().map(|a| a.agent_type.as_str()).collect::<Vec<_>>().join(", ")
        );

        let plan = if options.use_planning && selected.len() > 1 {
            let calls: Vec<ParsedCall> = selected
                .iter()
                .enumerate()
                .map(|(i, agent)| {
                    ParsedCall::new(
                        format!("call-{}", i + 1),
                        agent.agent_type.as_str(),
                        json!({"command": command, "role": agent.role}),
                    )
                })
                .collect();
            let plan_options = PlanOptions {
                command: command.to_string(),
                context: Some(context),
                user_id: options.user_id.clone(),
                project_id: options.project_id.clone(),
            };
            Some(self.planner.create_plan(&calls, &plan_options).await.plan)
        } else {
            None
        };

        let tasks = build_tasks(&selected, command);
        let results = self.execute_tasks(&tasks, options).await;
        let aggregated = aggregate_results(self.model.as_ref(), command, &results).await;

        OrchestrationOutcome {
            success: aggregated.success,
            command: command.to_string(),
            selected_agents: selected.iter().map(AgentSummary::from).collect(),
            plan,
            summary: aggregated.summary.clone(),
            metadata: Some(OrchestrationMetadata {
                total_agents: aggregated.total_agents,
                successful_agents: aggregated.successful_agents,
                failed_agents: aggregated.failed_agents,
                orchestrated_at: Utc::now(),
            }),
            results: Some(aggregated),
            error: None,
            suggestion: None,
        }
    }

    /// Parallel tasks run concurrently first, then sequential tasks one at a
    /// time with every earlier result as context. Results keep task order.
    pub async fn execute_tasks(&self, tasks: &[AgentTask], options: &OrchestrateOptions) -> Vec<TaskResult> {
        let total = tasks.len();
        let (parallel, sequential): (Vec<&AgentTask>, Vec<&AgentTask>) =
            tasks.iter().partition(|t| t.can_parallel);
        let mut results: Vec<TaskResult> = Vec::with_capacity(total);

        if !parallel.is_empty() {
            let mut pending: FuturesUnordered<_> = parallel
                .iter()
                .enumerate()
                .map(|(index, task)| async move { (index, self.execute_isolated(task, &[], options).await) })
                .collect();

            let mut finished: Vec<Option<TaskResult>> = vec![None; parallel.len()];
            let mut completed = 0;
            while let Some((index, result)) = pending.next().await {
                completed += 1;
                report(options.on_progress.as_ref(), &result, completed, total);
                finished[index] = Some(result);
            }
            results.extend(finished.into_iter().flatten());
        }

        for task in sequential {
            let result = self.execute_isolated(task, &results, options).await;
            report(options.on_progress.as_ref(), &result, results.len() + 1, total);
            results.push(result);
        }

        results
    }

    /// Runs one task; errors and panics become a failed result.
    async fn execute_isolated(
        &self,
        task: &AgentTask,
        previous: &[TaskResult],
        options: &OrchestrateOptions,
    ) -> TaskResult {
        debug!("executing {} ({})", task.id, task.agent);
        match AssertUnwindSafe(self.execute_task(task, previous, options))
            .catch_unwind()
            .await
        {
            Ok(Ok(value)) => TaskResult::completed(task, value),
            Ok(Err(e)) => {
                warn!("task {} ({}) failed: {}", task.id, task.agent, e);
                TaskResult::failed(task, e.to_string())
            }
            Err(_) => {
                error!("task {} ({}) panicked", task.id, task.agent);
                TaskResult::failed(task, CopilotError::AgentExecution(format!("task {} panicked", task.id)).to_string())
            }
        }
    }

    /// Direct action when one is detected, else a registered runtime, else a
    /// plain model completion in the agent's persona.
    pub async fn execute_task(
        &self,
        task: &AgentTask,
        previous: &[TaskResult],
        options: &OrchestrateOptions,
    ) -> Result<Value> {
        match self.actions.detect_intent(&task.command).await {
            Ok(intent) if intent.is_actionable() => {
                debug!("{} runs action {}: {}", task.id, intent.action, intent.reasoning);
                return self.actions.execute_action(&intent.action, &intent.parameters).await;
            }
            Ok(_) => {}
            Err(e) => warn!("intent detection failed for {}: {}", task.id, e),
        }

        let history: Vec<(String, Value)> = previous
            .iter()
            .filter_map(|r| r.result.as_ref().map(|v| (r.agent.to_string(), v.clone())))
            .collect();

        if let Some((info, runtime)) = self.registry.runtime_for(task.agent, task.agent_id.as_deref()).await {
            debug!("{} delegated to agent {}", task.id, info.id);
            let context: Map<String, Value> = history.into_iter().collect();
            let request = AgentRequest {
                command: task.command.clone(),
                role: task.role.clone(),
                context: Value::Object(context),
                user_id: options.user_id.clone(),
                project_id: options.project_id.clone(),
            };
            return runtime
                .execute(request)
                .await
                .map_err(|e| CopilotError::AgentExecution(e.to_string()).into());
        }

        let persona = task.agent.info().name;
        let messages = generate_agent_task_messages(&task.command, persona, &task.role, &history);
        let message = self
            .model
            .complete(CompletionRequest::new(messages).with_temperature(0.7).with_max_tokens(1500))
            .await?;

        Ok(json!({"message": message, "agentType": task.agent}))
    }
}

fn report(callback: Option<&TaskProgressCallback>, result: &TaskResult, completed: usize, total: usize) {
    if let Some(callback) = callback {
        callback(TaskProgressEvent {
            task: result.task_id.clone(),
            agent: result.agent,
            status: result.status,
            progress: TaskProgress { completed, total },
        });
    }
}
