use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Timelike, Utc};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::{
    context::ContextProvider,
    error::{Error, Result},
    llm::{ChatMessage, ChatModel, CompletionRequest},
    services::{ActionExecutor, ExecutionLogEntry, ExecutionLogStore, WorkflowService},
};

/// What a handler knows about the step it runs.
#[derive(Debug, Clone, Default)]
pub struct StepContext {
    pub step_id: String,
    pub function: String,
    pub user_id: Option<String>,
    pub project_id: Option<String>,
}

#[async_trait]
pub trait StepHandler: Send + Sync {
    async fn execute(&self, args: &Value, ctx: &StepContext) -> Result<Value>;
}

/// Collaborators the built-in handlers run against.
#[derive(Clone)]
pub struct HandlerServices {
    pub model: Arc<dyn ChatModel>,
    pub context: Arc<dyn ContextProvider>,
    pub workflows: Arc<dyn WorkflowService>,
    pub actions: Arc<dyn ActionExecutor>,
    pub logs: Option<Arc<dyn ExecutionLogStore>>,
}

fn str_arg<'a>(args: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|key| args.get(*key).and_then(Value::as_str))
        .filter(|s| !s.trim().is_empty())
}

fn project_of(args: &Value, ctx: &StepContext) -> Option<String> {
    str_arg(args, &["project_id", "projectId"])
        .map(str::to_string)
        .or_else(|| ctx.project_id.clone())
}

struct LoadContextHandler {
    context: Arc<dyn ContextProvider>,
}

#[async_trait]
impl StepHandler for LoadContextHandler {
    async fn execute(&self, _args: &Value, _ctx: &StepContext) -> Result<Value> {
        let snapshot = self.context.load().await;
        Ok(json!({ "context": serde_json::to_value(snapshot.as_ref())?, "loaded": true }))
    }
}

/// Writes post copy with the model; falls back to a post workflow when the
/// model is unavailable.
struct PostHandler {
    model: Arc<dyn ChatModel>,
    context: Arc<dyn ContextProvider>,
    workflows: Arc<dyn WorkflowService>,
}

#[async_trait]
impl StepHandler for PostHandler {
    async fn execute(&self, args: &Value, ctx: &StepContext) -> Result<Value> {
        let topic = str_arg(args, &["topic", "content", "message"]).unwrap_or("Create a post");
        let platform = str_arg(args, &["platform"]).unwrap_or("facebook");
        let tone = str_arg(args, &["tone"]).unwrap_or("friendly");

        let request = CompletionRequest::new(vec![
            ChatMessage::system(format!(
                "You write {} social media posts for {}. Reply with the post text only.",
                tone, platform
            )),
            ChatMessage::user(topic),
        ])
        .with_temperature(0.7);

        match self.model.complete(request).await {
            Ok(content) => Ok(json!({
                "posted": true,
                "platform": platform,
                "topic": topic,
                "content": content,
                "projectId": project_of(args, ctx),
            })),
            Err(e) => {
                warn!("post composition failed for {}, generating a post workflow: {}", ctx.step_id, e);
                let context = self.context.load().await;
                let workflow = self
                    .workflows
                    .generate_from_command("create_post", args, &context)
                    .await?;
                Ok(json!({ "workflowId": workflow.get("id"), "created": true }))
            }
        }
    }
}

/// Next of 09:00, 12:00, 18:00, 21:00 after `now`.
pub fn next_optimal_post_time(now: DateTime<Utc>) -> DateTime<Utc> {
    const OPTIMAL_HOURS: [u32; 4] = [9, 12, 18, 21];
    let (day, hour) = match OPTIMAL_HOURS.iter().find(|&&h| h > now.hour()) {
        Some(&hour) => (now.date_naive(), hour),
        None => ((now + Duration::days(1)).date_naive(), OPTIMAL_HOURS[0]),
    };
    day.and_hms_opt(hour, 0, 0)
        .map(|naive| naive.and_utc())
        .unwrap_or(now)
}

struct SchedulePostHandler;

#[async_trait]
impl StepHandler for SchedulePostHandler {
    async fn execute(&self, args: &Value, _ctx: &StepContext) -> Result<Value> {
        let scheduled_time = str_arg(args, &["scheduledTime", "scheduled_time", "schedule"])
            .filter(|s| *s != "now")
            .map(str::to_string)
            .unwrap_or_else(|| next_optimal_post_time(Utc::now()).to_rfc3339());
        Ok(json!({
            "scheduled": true,
            "scheduledTime": scheduled_time,
            "message": format!("Post scheduled for {}", scheduled_time),
        }))
    }
}

struct CarouselHandler;

#[async_trait]
impl StepHandler for CarouselHandler {
    async fn execute(&self, args: &Value, _ctx: &StepContext) -> Result<Value> {
        Ok(json!({
            "type": "carousel",
            "images": args.get("images").cloned().unwrap_or_else(|| json!([])),
            "message": "Carousel post created",
        }))
    }
}

/// Starts a backup and records it in the execution log.
struct BackupHandler {
    logs: Option<Arc<dyn ExecutionLogStore>>,
}

#[async_trait]
impl StepHandler for BackupHandler {
    async fn execute(&self, args: &Value, ctx: &StepContext) -> Result<Value> {
        let backup_id = format!("backup-{}", uuid::Uuid::new_v4());
        let destination = str_arg(args, &["destination"]).unwrap_or("local");

        if let Some(logs) = &self.logs {
            let mut entry = ExecutionLogEntry::new(ctx.function.clone(), "initiated");
            entry.user_id = ctx.user_id.clone();
            entry.project_id = project_of(args, ctx);
            entry.input_data = args.clone();
            entry.output = json!({ "backupId": backup_id });
            logs.append(entry).await?;
        }

        Ok(json!({
            "backupId": backup_id,
            "destination": destination,
            "status": "initiated",
            "message": "Backup started",
        }))
    }
}

struct GenerateWorkflowHandler {
    context: Arc<dyn ContextProvider>,
    workflows: Arc<dyn WorkflowService>,
}

#[async_trait]
impl StepHandler for GenerateWorkflowHandler {
    async fn execute(&self, args: &Value, ctx: &StepContext) -> Result<Value> {
        let context = self.context.load().await;
        let function = str_arg(args, &["function", "type"]).unwrap_or(ctx.function.as_str());
        let workflow = self
            .workflows
            .generate_from_command(function, args, &context)
            .await?;
        Ok(json!({
            "workflowId": workflow.get("id"),
            "workflowName": workflow.get("name"),
            "created": true,
        }))
    }
}

struct ExecuteWorkflowHandler {
    workflows: Arc<dyn WorkflowService>,
}

#[async_trait]
impl StepHandler for ExecuteWorkflowHandler {
    async fn execute(&self, args: &Value, _ctx: &StepContext) -> Result<Value> {
        let workflow_id = str_arg(args, &["workflowId", "workflow_id"])
            .ok_or_else(|| Error::collaborator("execute_workflow needs a workflowId"))?;
        let input = args.get("input").cloned().unwrap_or_else(|| json!({}));
        let run = self.workflows.execute_workflow(workflow_id, &input).await?;
        Ok(json!({
            "executionId": run.get("id"),
            "status": run.get("status"),
        }))
    }
}

struct AnalyzeDataHandler;

#[async_trait]
impl StepHandler for AnalyzeDataHandler {
    async fn execute(&self, args: &Value, _ctx: &StepContext) -> Result<Value> {
        Ok(json!({
            "analyzed": true,
            "type": str_arg(args, &["type", "metric"]).unwrap_or("overview"),
            "insights": [],
        }))
    }
}

struct AbTestHandler;

#[async_trait]
impl StepHandler for AbTestHandler {
    async fn execute(&self, args: &Value, _ctx: &StepContext) -> Result<Value> {
        Ok(json!({
            "testId": format!("ab-{}", uuid::Uuid::new_v4()),
            "variants": args.get("variants").cloned().unwrap_or_else(|| json!(["A", "B"])),
            "message": "A/B test created",
        }))
    }
}

struct CrossPostHandler;

#[async_trait]
impl StepHandler for CrossPostHandler {
    async fn execute(&self, args: &Value, _ctx: &StepContext) -> Result<Value> {
        Ok(json!({
            "platforms": args.get("platforms").cloned().unwrap_or_else(|| json!(["instagram"])),
            "message": "Cross-post initiated",
        }))
    }
}

/// Unknown functions go through the action executor, then degrade to a
/// generic acknowledgement.
pub struct ActionFallbackHandler {
    actions: Arc<dyn ActionExecutor>,
}

impl ActionFallbackHandler {
    pub fn new(actions: Arc<dyn ActionExecutor>) -> Self {
        Self { actions }
    }
}

#[async_trait]
impl StepHandler for ActionFallbackHandler {
    async fn execute(&self, args: &Value, ctx: &StepContext) -> Result<Value> {
        match self.actions.execute_action(&ctx.function, args).await {
            Ok(result) => Ok(result),
            Err(e) => {
                debug!("action executor could not run {}: {}", ctx.function, e);
                warn!("generic execution for {}", ctx.function);
                Ok(json!({
                    "executed": true,
                    "functionName": ctx.function,
                    "message": "Generic execution completed",
                }))
            }
        }
    }
}

/// Function name to handler table with a mandatory fallback.
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn StepHandler>>,
    fallback: Arc<dyn StepHandler>,
}

impl HandlerRegistry {
    pub fn new(fallback: Arc<dyn StepHandler>) -> Self {
        Self {
            handlers: HashMap::new(),
            fallback,
        }
    }

    /// The built-in handler set.
    pub fn with_defaults(services: &HandlerServices) -> Self {
        let mut registry = Self::new(Arc::new(ActionFallbackHandler::new(services.actions.clone())));

        registry.register(
            "load_context",
            Arc::new(LoadContextHandler {
                context: services.context.clone(),
            }),
        );
        registry.register_all(
            &["create_post", "post_facebook", "generate_and_post"],
            Arc::new(PostHandler {
                model: services.model.clone(),
                context: services.context.clone(),
                workflows: services.workflows.clone(),
            }),
        );
        registry.register("schedule_post", Arc::new(SchedulePostHandler));
        registry.register("create_carousel", Arc::new(CarouselHandler));
        registry.register(
            "backup_database",
            Arc::new(BackupHandler {
                logs: services.logs.clone(),
            }),
        );
        registry.register_all(
            &["generate_workflow", "create_workflow"],
            Arc::new(GenerateWorkflowHandler {
                context: services.context.clone(),
                workflows: services.workflows.clone(),
            }),
        );
        registry.register(
            "execute_workflow",
            Arc::new(ExecuteWorkflowHandler {
                workflows: services.workflows.clone(),
            }),
        );
        registry.register_all(&["analyze_data", "analyze_marketing", "get_stats"], Arc::new(AnalyzeDataHandler));
        registry.register_all(&["ab_test", "create_ab_test"], Arc::new(AbTestHandler));
        registry.register_all(&["cross_post", "instagram_post"], Arc::new(CrossPostHandler));

        registry
    }

    pub fn register(&mut self, function: &str, handler: Arc<dyn StepHandler>) {
        self.handlers.insert(function.to_string(), handler);
    }

    pub fn register_all(&mut self, functions: &[&str], handler: Arc<dyn StepHandler>) {
        for function in functions {
            self.register(function, handler.clone());
        }
    }

    pub fn has_handler(&self, function: &str) -> bool {
        self.handlers.contains_key(function)
    }

    /// Handler for `function`, or the fallback.
    pub fn resolve(&self, function: &str) -> Arc<dyn StepHandler> {
        self.handlers
            .get(function)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }

    pub fn functions(&self) -> Vec<String> {
        let mut functions: Vec<String> = self.handlers.keys().cloned().collect();
        functions.sort();
        functions
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::{
        context::BusinessContext,
        llm::ScriptedModel,
        services::{InMemoryExecutionLogStore, InMemoryWorkflowService, KeywordActionExecutor},
    };

    fn services(logs: Arc<InMemoryExecutionLogStore>) -> HandlerServices {
        HandlerServices {
            model: Arc::new(ScriptedModel::new().with_fallback_completion("Hello world")),
            context: Arc::new(BusinessContext::default()),
            workflows: Arc::new(InMemoryWorkflowService::new()),
            actions: Arc::new(KeywordActionExecutor::new()),
            logs: Some(logs),
        }
    }

    fn ctx(function: &str) -> StepContext {
        StepContext {
            step_id: "step-1".into(),
            function: function.into(),
            ..Default::default()
        }
    }

    #[test]
    fn optimal_time_rolls_over_to_next_morning() {
        let evening = Utc.with_ymd_and_hms(2024, 5, 1, 22, 15, 0).unwrap();
        let next = next_optimal_post_time(evening);
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 5, 2, 9, 0, 0).unwrap());

        let morning = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        assert_eq!(next_optimal_post_time(morning).hour(), 12);
    }

    #[tokio::test]
    async fn backup_is_recorded_in_the_log() {
        let logs = Arc::new(InMemoryExecutionLogStore::new());
        let registry = HandlerRegistry::with_defaults(&services(logs.clone()));

        let handler = registry.resolve("backup_database");
        let result = handler
            .execute(&json!({"destination": "google_drive"}), &ctx("backup_database"))
            .await
            .unwrap();

        assert_eq!(result["destination"], "google_drive");
        assert!(logs.last_backup_at().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn unknown_functions_use_the_fallback() {
        let registry = HandlerRegistry::with_defaults(&services(Arc::new(InMemoryExecutionLogStore::new())));
        assert!(!registry.has_handler("send_sms"));

        let result = registry
            .resolve("send_sms")
            .execute(&json!({}), &ctx("send_sms"))
            .await
            .unwrap();
        assert_eq!(result["executed"], true);
        assert_eq!(result["functionName"], "send_sms");
    }

    #[tokio::test]
    async fn generated_workflows_can_be_executed() {
        let registry = HandlerRegistry::with_defaults(&services(Arc::new(InMemoryExecutionLogStore::new())));
        let created = registry
            .resolve("generate_workflow")
            .execute(&json!({"name": "Daily report"}), &ctx("generate_workflow"))
            .await
            .unwrap();

        let run = registry
            .resolve("execute_workflow")
            .execute(&json!({"workflowId": created["workflowId"]}), &ctx("execute_workflow"))
            .await
            .unwrap();
        assert_eq!(run["status"], "success");

        assert!(registry
            .resolve("execute_workflow")
            .execute(&json!({}), &ctx("execute_workflow"))
            .await
            .is_err());
    }
}
