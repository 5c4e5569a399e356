use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    context::BusinessContext,
    error::Result,
    llm::{ChatModel, CompletionRequest, complete_json},
    message::planner::generate_decomposition_messages,
    parser::ParsedCall,
    planning::{
        plan::DecompositionSource,
        step::{Step, StepPriority},
    },
};

pub const CONTEXT_STEP_ID: &str = "load-context";
const CONTEXT_FUNCTION: &str = "load_context";

#[derive(Debug)]
pub struct Decomposition {
    pub steps: Vec<Step>,
    pub source: DecompositionSource,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelStep {
    id: Option<String>,
    name: Option<String>,
    description: Option<String>,
    #[serde(default)]
    function: String,
    #[serde(default)]
    arguments: Value,
    estimated_time: Option<String>,
    can_parallel: Option<bool>,
    #[serde(default)]
    depends_on: Vec<String>,
    priority: Option<String>,
    #[serde(default)]
    optional: bool,
    #[serde(default)]
    critical: bool,
}

impl ModelStep {
    fn into_step(self, fallback_id: String) -> Step {
        let mut step = Step::new(self.id.unwrap_or(fallback_id), self.function);
        if let Some(name) = self.name {
            step.description = self.description.unwrap_or_else(|| name.clone());
            step.name = name;
        } else if let Some(description) = self.description {
            step.description = description;
        }
        if !self.arguments.is_null() {
            step.arguments = self.arguments;
        }
        step.estimated_time = self.estimated_time.unwrap_or_else(|| "~5s".to_string());
        step.can_parallel = self.can_parallel != Some(false);
        step.depends_on = self.depends_on;
        step.priority = self
            .priority
            .as_deref()
            .map(StepPriority::parse)
            .unwrap_or_default();
        step.optional = self.optional;
        step.critical = self.critical;
        step
    }
}

fn steps_from_response(response: &Value) -> Vec<Step> {
    let Some(raw_steps) = response.get("steps").and_then(Value::as_array) else {
        return Vec::new();
    };

    raw_steps
        .iter()
        .cloned()
        .enumerate()
        .filter_map(|(i, raw)| match serde_json::from_value::<ModelStep>(raw) {
            Ok(step) => Some(step.into_step(format!("step-{}", i + 1))),
            Err(e) => {
                warn!("skipping malformed planned step: {}", e);
                None
            }
        })
        .collect()
}

/// One independent step per call.
pub fn steps_from_calls(calls: &[ParsedCall]) -> Vec<Step> {
    calls
        .iter()
        .enumerate()
        .map(|(i, call)| {
            Step::new(format!("step-{}", i + 1), call.function.clone())
                .with_arguments(call.arguments.clone())
        })
        .collect()
}

/// One step per call, each depending on the previous one.
pub fn sequential_fallback(calls: &[ParsedCall]) -> Vec<Step> {
    let mut steps = steps_from_calls(calls);
    for i in 1..steps.len() {
        let previous = steps[i - 1].id.clone();
        steps[i].depends_on = vec![previous];
    }
    steps
}

fn context_step(project_id: &str) -> Step {
    Step::new(CONTEXT_STEP_ID, CONTEXT_FUNCTION)
        .with_arguments(serde_json::json!({ "project_id": project_id }))
        .with_priority(StepPriority::High)
}

/// Prepends a context-loading step that every root step waits for.
fn prepend_context_step(steps: &mut Vec<Step>, project_id: &str) {
    if steps.iter().any(|s| s.function == CONTEXT_FUNCTION) {
        return;
    }
    for step in steps.iter_mut().filter(|s| s.depends_on.is_empty()) {
        step.depends_on.push(CONTEXT_STEP_ID.to_string());
    }
    steps.insert(0, context_step(project_id));
}

async fn request_steps(
    model: &dyn ChatModel,
    calls: &[ParsedCall],
    command: &str,
    context: &BusinessContext,
    project_id: Option<&str>,
) -> Result<Vec<Step>> {
    let messages = generate_decomposition_messages(command, calls, context, project_id);
    let response = complete_json(model, CompletionRequest::new(messages).with_temperature(0.3)).await?;
    Ok(steps_from_response(&response))
}

/// Breaks parsed calls into atomic steps. Never fails: a model error
/// degrades to the sequential fallback.
pub async fn decompose(
    model: &dyn ChatModel,
    calls: &[ParsedCall],
    command: &str,
    context: &BusinessContext,
    project_id: Option<&str>,
) -> Decomposition {
    if calls.is_empty() {
        return Decomposition {
            steps: Vec::new(),
            source: DecompositionSource::Calls,
        };
    }

    let (mut steps, source) = match request_steps(model, calls, command, context, project_id).await {
        Ok(steps) if !steps.is_empty() => (steps, DecompositionSource::Model),
        Ok(_) => {
            debug!("model proposed no steps, planning one step per call");
            (steps_from_calls(calls), DecompositionSource::Calls)
        }
        Err(e) => {
            warn!("step decomposition failed, chaining calls sequentially: {}", e);
            return Decomposition {
                steps: sequential_fallback(calls),
                source: DecompositionSource::SequentialFallback,
            };
        }
    };

    if let Some(project_id) = project_id {
        prepend_context_step(&mut steps, project_id);
    }

    Decomposition { steps, source }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn model_steps_get_defaults() {
        let response = json!({
            "steps": [
                { "id": "s1", "name": "Generate content", "function": "generate_content", "estimatedTime": "~20s" },
                { "function": "publish", "dependsOn": ["s1"], "canParallel": false, "priority": "high" },
                "not a step"
            ]
        });
        let steps = steps_from_response(&response);

        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].description, "Generate content");
        assert!(steps[0].can_parallel);
        assert_eq!(steps[1].id, "step-2");
        assert_eq!(steps[1].estimated_time, "~5s");
        assert_eq!(steps[1].priority, StepPriority::High);
        assert!(!steps[1].can_parallel);
    }

    #[test]
    fn fallback_chains_calls() {
        let calls = vec![
            ParsedCall::new("c1", "create_post", json!({})),
            ParsedCall::new("c2", "backup_database", json!({})),
            ParsedCall::new("c3", "get_stats", json!({})),
        ];
        let steps = sequential_fallback(&calls);
        assert!(steps[0].depends_on.is_empty());
        assert_eq!(steps[1].depends_on, vec!["step-1"]);
        assert_eq!(steps[2].depends_on, vec!["step-2"]);
    }

    #[test]
    fn context_step_gates_root_steps() {
        let mut steps = vec![
            Step::new("step-1", "create_post"),
            Step::new("step-2", "schedule_post").depends_on("step-1"),
        ];
        prepend_context_step(&mut steps, "p1");

        assert_eq!(steps[0].id, CONTEXT_STEP_ID);
        assert_eq!(steps[1].depends_on, vec![CONTEXT_STEP_ID]);
        assert_eq!(steps[2].depends_on, vec!["step-1"]);
    }
}
