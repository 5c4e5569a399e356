use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::{
    context::ContextProvider,
    input::PlanOptions,
    llm::ChatModel,
    parser::ParsedCall,
    planning::{
        decompose::decompose,
        plan::{Plan, PlanMetadata, PlanOutcome},
    },
};

pub struct Planner {
    model: Arc<dyn ChatModel>,
    context: Arc<dyn ContextProvider>,
}

impl Planner {
    pub fn new(model: Arc<dyn ChatModel>, context: Arc<dyn ContextProvider>) -> Self {
        Self { model, context }
    }

    /// Builds a validated plan. `success` is false whenever validation found
    /// errors; such a plan must not be executed.
    pub async fn create_plan(&self, calls: &[ParsedCall], options: &PlanOptions) -> PlanOutcome {
        let context = match &options.context {
            Some(context) => context.clone(),
            None => self.context.load().await,
        };

        let decomposition = decompose(
            self.model.as_ref(),
            calls,
            &options.command,
            &context,
            options.project_id.as_deref(),
        )
        .await;

        let (plan, mut validation) = Plan::from_steps(decomposition.steps);
        if plan.steps.is_empty() {
            validation.warnings.push("plan has no steps".to_string());
        }

        if validation.valid {
            info!(
                "plan {} ready: {} step(s) over {} level(s), {}",
                plan.id,
                plan.total_steps,
                plan.parallel_groups.len(),
                plan.estimated_duration
            );
        } else {
            warn!("plan {} rejected: {}", plan.id, validation.errors.join("; "));
        }

        PlanOutcome {
            success: validation.valid,
            metadata: PlanMetadata {
                command: options.command.clone(),
                created_at: Utc::now(),
                user_id: options.user_id.clone(),
                project_id: options.project_id.clone(),
                decomposition: decomposition.source,
            },
            plan,
            validation,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        context::BusinessContext,
        llm::ScriptedModel,
        planning::{decompose::CONTEXT_STEP_ID, plan::DecompositionSource},
    };

    fn planner(model: Arc<ScriptedModel>) -> Planner {
        Planner::new(model, Arc::new(BusinessContext::default()))
    }

    #[tokio::test]
    async fn model_steps_become_a_leveled_plan() {
        let model = Arc::new(ScriptedModel::new());
        model.push_completion(
            json!({
                "steps": [
                    { "id": "ctx", "function": "load_context", "canParallel": false },
                    { "id": "gen", "function": "generate_content", "dependsOn": ["ctx"] },
                    { "id": "pub", "function": "create_post", "dependsOn": ["gen", "missing"] }
                ]
            })
            .to_string(),
        );

        let calls = vec![ParsedCall::new("call-1", "create_post", json!({"topic": "AI"}))];
        let outcome = planner(model).create_plan(&calls, &PlanOptions::new("post about AI")).await;

        assert!(outcome.success);
        assert_eq!(outcome.metadata.decomposition, DecompositionSource::Model);
        let order: Vec<_> = outcome.plan.steps.iter().map(|s| (s.id.as_str(), s.execution_level)).collect();
        assert_eq!(order, vec![("ctx", 0), ("gen", 1), ("pub", 2)]);
        assert_eq!(outcome.validation.warnings.len(), 1);
    }

    #[tokio::test]
    async fn model_failure_falls_back_to_a_chain() {
        let model = Arc::new(ScriptedModel::new());
        model.push_completion_error("timeout");

        let calls = vec![
            ParsedCall::new("call-1", "create_post", json!({})),
            ParsedCall::new("call-2", "get_stats", json!({})),
        ];
        let outcome = planner(model).create_plan(&calls, &PlanOptions::new("x")).await;

        assert!(outcome.success);
        assert_eq!(outcome.metadata.decomposition, DecompositionSource::SequentialFallback);
        assert_eq!(outcome.plan.parallel_steps, 0);
        assert_eq!(outcome.plan.steps[1].execution_level, 1);
    }

    #[tokio::test]
    async fn project_adds_a_context_step_first() {
        let model = Arc::new(ScriptedModel::new());
        model.push_completion(r#"{"steps": []}"#);

        let calls = vec![
            ParsedCall::new("call-1", "create_post", json!({})),
            ParsedCall::new("call-2", "get_stats", json!({})),
        ];
        let outcome = planner(model)
            .create_plan(&calls, &PlanOptions::new("x").with_project("p1"))
            .await;

        assert_eq!(outcome.metadata.decomposition, DecompositionSource::Calls);
        assert_eq!(outcome.plan.steps[0].id, CONTEXT_STEP_ID);
        assert_eq!(outcome.plan.parallel_groups.len(), 2);
        assert!(outcome.plan.parallel_groups[1].parallel);
    }
}
