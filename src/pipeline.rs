use serde::Serialize;
use tracing::{info, warn};

use crate::{
    error::Result,
    execution::{ExecutionOutcome, Executor},
    input::{ExecuteOptions, ParseOptions, PlanOptions},
    parser::{CommandParser, ParseOutcome},
    planning::{PlanOutcome, Planner},
    tools::FunctionSpec,
};

/// Everything produced for one command. Later stages are absent when an
/// earlier one stopped the run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineOutcome {
    pub command: String,
    pub parse: ParseOutcome,
    pub plan: Option<PlanOutcome>,
    pub execution: Option<ExecutionOutcome>,
}

impl PipelineOutcome {
    pub fn success(&self) -> bool {
        self.execution.as_ref().is_some_and(|e| e.success)
    }
}

/// Command → parse → plan → execute.
pub struct CommandPipeline {
    parser: CommandParser,
    planner: Planner,
    executor: Executor,
    catalog: Vec<FunctionSpec>,
}

impl CommandPipeline {
    pub fn new(parser: CommandParser, planner: Planner, executor: Executor, catalog: Vec<FunctionSpec>) -> Self {
        Self {
            parser,
            planner,
            executor,
            catalog,
        }
    }

    pub fn catalog(&self) -> &[FunctionSpec] {
        &self.catalog
    }

    pub async fn run(&self, command: &str, options: &ExecuteOptions) -> Result<PipelineOutcome> {
        let parse_options = ParseOptions {
            project_id: options.project_id.clone(),
            user_context: None,
        };
        let parse = self.parser.parse(command, &self.catalog, &parse_options).await?;

        let mut outcome = PipelineOutcome {
            command: command.to_string(),
            parse,
            plan: None,
            execution: None,
        };
        if !outcome.parse.success {
            info!("command not understood: {}", outcome.parse.error.as_deref().unwrap_or_default());
            return Ok(outcome);
        }

        let plan_options = PlanOptions {
            command: command.to_string(),
            context: None,
            user_id: options.user_id.clone(),
            project_id: options.project_id.clone(),
        };
        let plan = self.planner.create_plan(&outcome.parse.tool_calls, &plan_options).await;
        if !plan.success {
            warn!("plan {} not executed: validation failed", plan.plan.id);
            outcome.plan = Some(plan);
            return Ok(outcome);
        }

        let execution = self.executor.execute_plan(&plan.plan, options).await?;
        outcome.plan = Some(plan);
        outcome.execution = Some(execution);
        Ok(outcome)
    }
}
