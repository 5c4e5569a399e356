use std::{sync::Arc, time::Duration};

use chrono::Utc;
use futures::{StreamExt, stream::FuturesUnordered};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    error::{CopilotError, Result},
    execution::{
        handlers::{HandlerRegistry, StepContext, StepHandler},
        reference::ReferenceScope,
        retry::RetryPolicy,
        state::{Execution, ExecutionOutcome, ExecutionStatus, ProgressEvent, StepOutcome, StepResult},
    },
    input::{ExecuteOptions, ProgressCallback},
    planning::{Plan, Step, graph::level_is_parallel, validate},
    services::{ExecutionLogEntry, ExecutionLogStore},
};

/// Per-run settings every step sees.
#[derive(Clone)]
struct StepSettings {
    user_id: Option<String>,
    project_id: Option<String>,
    timeout: Option<Duration>,
    cancel: CancellationToken,
    policy: RetryPolicy,
}

/// Walks a validated plan level by level.
pub struct Executor {
    handlers: Arc<HandlerRegistry>,
    retry: RetryPolicy,
    logs: Option<Arc<dyn ExecutionLogStore>>,
}

impl Executor {
    pub fn new(handlers: Arc<HandlerRegistry>) -> Self {
        Self {
            handlers,
            retry: RetryPolicy::default(),
            logs: None,
        }
    }

    /// Backoff and retry classification; the attempt bound comes from
    /// `ExecuteOptions::max_retries`.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_log_store(mut self, logs: Arc<dyn ExecutionLogStore>) -> Self {
        self.logs = Some(logs);
        self
    }

    pub async fn execute_plan(&self, plan: &Plan, options: &ExecuteOptions) -> Result<ExecutionOutcome> {
        let report = validate(&plan.steps);
        if !report.valid {
            warn!("refusing to execute invalid plan {}", plan.id);
            return Err(CopilotError::PlanValidation(report.errors).into());
        }

        let settings = StepSettings {
            user_id: options.user_id.clone(),
            project_id: options.project_id.clone(),
            timeout: options.step_timeout,
            cancel: options.cancel.clone(),
            policy: self.retry.clone().with_max_attempts(options.max_retries.max(1)),
        };

        let mut execution = Execution::start(
            plan.id.clone(),
            plan.steps.iter().map(|s| s.id.clone()).collect(),
        );
        info!("executing plan {} ({} steps)", plan.id, execution.total_steps);

        for (level, steps) in plan.levels() {
            if settings.cancel.is_cancelled() {
                execution.stop("execution cancelled");
                break;
            }

            if level_is_parallel(steps.iter().copied()) {
                debug!("level {}: {} steps in parallel", level, steps.len());
                self.run_parallel(&steps, &mut execution, &settings, options.on_progress.as_ref())
                    .await;
            } else {
                debug!("level {}: {} steps in sequence", level, steps.len());
                for step in steps {
                    let scope = ReferenceScope::from_results(&execution.results);
                    let result = run_step(
                        step.clone(),
                        self.handlers.resolve(&step.function),
                        &scope,
                        &settings,
                    )
                    .await;
                    self.complete_step(&mut execution, result, &settings, options.on_progress.as_ref());
                    if execution.status != ExecutionStatus::Running {
                        break;
                    }
                }
            }

            if execution.status != ExecutionStatus::Running {
                break;
            }
        }

        execution.finish();
        let summary = execution.summary();
        info!(
            "plan {} finished {:?}: {}/{} steps succeeded in {}ms",
            plan.id, execution.status, summary.successful_steps, summary.total_steps, summary.duration_ms
        );
        self.write_log(plan, &execution, options).await;

        Ok(ExecutionOutcome {
            success: execution.status == ExecutionStatus::Completed,
            execution,
            summary,
        })
    }

    /// Runs one level concurrently. A panicking member becomes a failed
    /// result; results are recorded in plan order once all members finish.
    async fn run_parallel(
        &self,
        steps: &[&Step],
        execution: &mut Execution,
        settings: &StepSettings,
        on_progress: Option<&ProgressCallback>,
    ) {
        let scope = Arc::new(ReferenceScope::from_results(&execution.results));
        let mut pending = FuturesUnordered::new();

        for (index, step) in steps.iter().enumerate() {
            let step = (*step).clone();
            let handler = self.handlers.resolve(&step.function);
            let scope = scope.clone();
            let settings = settings.clone();
            let handle = tokio::spawn(async move { run_step(step, handler, &scope, &settings).await });
            pending.push(async move { (index, handle.await) });
        }

        let mut finished: Vec<Option<StepResult>> = vec![None; steps.len()];
        while let Some((index, joined)) = pending.next().await {
            let result = joined.unwrap_or_else(|e| {
                let step = steps[index];
                error!("step {} aborted: {}", step.id, e);
                StepResult {
                    step_id: step.id.clone(),
                    step_name: step.name.clone(),
                    result: StepOutcome::failed(
                        format!("step aborted: {}", e),
                        1,
                        step.optional,
                        step.critical,
                    ),
                    completed_at: Utc::now(),
                }
            });

            execution.current_step += 1;
            if let Some(callback) = on_progress {
                callback(ProgressEvent::new(&result, execution.current_step, execution.total_steps));
            }
            finished[index] = Some(result);
        }

        if settings.cancel.is_cancelled() {
            execution.stop("execution cancelled");
        }
        for result in finished.into_iter().flatten() {
            execution.record(result);
        }
    }

    fn complete_step(
        &self,
        execution: &mut Execution,
        result: StepResult,
        settings: &StepSettings,
        on_progress: Option<&ProgressCallback>,
    ) {
        execution.current_step += 1;
        if let Some(callback) = on_progress {
            callback(ProgressEvent::new(&result, execution.current_step, execution.total_steps));
        }
        if settings.cancel.is_cancelled() {
            execution.stop("execution cancelled");
        }
        execution.record(result);
    }

    async fn write_log(&self, plan: &Plan, execution: &Execution, options: &ExecuteOptions) {
        let Some(logs) = &self.logs else {
            return;
        };

        let status = serde_json::to_value(execution.status)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| "unknown".to_string());

        let mut entry = ExecutionLogEntry::new("execute_plan", status);
        entry.plan_id = Some(plan.id.clone());
        entry.user_id = options.user_id.clone();
        entry.project_id = options.project_id.clone();
        entry.input_data = json!({
            "functions": plan.steps.iter().map(|s| s.function.as_str()).collect::<Vec<_>>(),
        });
        entry.output = serde_json::to_value(execution.summary()).unwrap_or(Value::Null);

        if let Err(e) = logs.append(entry).await {
            warn!("failed to write execution log for plan {}: {}", plan.id, e);
        }
    }
}

/// Resolves references, then runs the handler under the retry policy.
async fn run_step(
    step: Step,
    handler: Arc<dyn StepHandler>,
    scope: &ReferenceScope,
    settings: &StepSettings,
) -> StepResult {
    let resolved = scope.resolve(&step.arguments);
    if !resolved.unresolved.is_empty() {
        warn!(
            "step {} has unresolved references: {}",
            step.id,
            resolved.unresolved.join(", ")
        );
    }

    let ctx = StepContext {
        step_id: step.id.clone(),
        function: step.function.clone(),
        user_id: settings.user_id.clone(),
        project_id: settings.project_id.clone(),
    };

    let mut outcome = attempt_with_retry(&step, handler.as_ref(), &resolved.value, &ctx, settings).await;
    outcome.unresolved_references = resolved.unresolved;

    StepResult {
        step_id: step.id,
        step_name: step.name,
        result: outcome,
        completed_at: Utc::now(),
    }
}

async fn attempt_with_retry(
    step: &Step,
    handler: &dyn StepHandler,
    args: &Value,
    ctx: &StepContext,
    settings: &StepSettings,
) -> StepOutcome {
    let policy = &settings.policy;
    let mut attempt = 0;

    loop {
        attempt += 1;

        let result = tokio::select! {
            _ = settings.cancel.cancelled() => Err(CopilotError::Cancelled.to_string()),
            result = run_once(handler, args, ctx, settings.timeout) => result,
        };

        let message = match result {
            Ok(value) => {
                debug!("step {} succeeded on attempt {}", step.id, attempt);
                return StepOutcome::succeeded(value, attempt);
            }
            Err(message) => message,
        };

        if settings.cancel.is_cancelled() || !policy.should_retry(attempt, &message) {
            warn!(
                "step {} failed after {}/{} attempt(s): {}",
                step.id, attempt, policy.max_attempts, message
            );
            return StepOutcome::failed(message, attempt, step.optional, step.critical);
        }

        let delay = policy.delay_after(attempt);
        warn!(
            "step {} attempt {}/{} failed ({}), retrying in {:?}",
            step.id, attempt, policy.max_attempts, message, delay
        );
        tokio::select! {
            _ = settings.cancel.cancelled() => {
                return StepOutcome::failed(message, attempt, step.optional, step.critical);
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

async fn run_once(
    handler: &dyn StepHandler,
    args: &Value,
    ctx: &StepContext,
    timeout: Option<Duration>,
) -> std::result::Result<Value, String> {
    let execution = handler.execute(args, ctx);
    let result = match timeout {
        Some(limit) => match tokio::time::timeout(limit, execution).await {
            Ok(result) => result,
            Err(_) => return Err(CopilotError::StepTimeout(ctx.step_id.clone()).to_string()),
        },
        None => execution.await,
    };
    result.map_err(|e| e.to_string())
}
