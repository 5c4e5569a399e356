use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::utils::humanize_identifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepPriority {
    High,
    #[default]
    Medium,
    Low,
}

impl StepPriority {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "high" => Self::High,
            "low" => Self::Low,
            _ => Self::Medium,
        }
    }
}

/// One atomic unit of planned work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub id: String,
    pub name: String,
    pub description: String,
    pub function: String,
    #[serde(default)]
    pub arguments: Value,
    pub estimated_time: String,
    pub can_parallel: bool,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub priority: StepPriority,
    /// Assigned by leveling; zero until then.
    #[serde(default)]
    pub execution_level: usize,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub critical: bool,
}

impl Step {
    /// A step for `function` with defaults derived from the function name.
    pub fn new(id: impl Into<String>, function: impl Into<String>) -> Self {
        let function = function.into();
        Self {
            id: id.into(),
            name: humanize_identifier(&function),
            description: format!("Execute {}", function),
            estimated_time: estimate_step_time(&function).to_string(),
            can_parallel: can_function_parallel(&function),
            function,
            arguments: Value::Object(Default::default()),
            depends_on: Vec::new(),
            priority: StepPriority::default(),
            execution_level: 0,
            optional: false,
            critical: false,
        }
    }

    pub fn with_arguments(mut self, arguments: Value) -> Self {
        self.arguments = arguments;
        self
    }

    pub fn depends_on(mut self, step_id: impl Into<String>) -> Self {
        let step_id = step_id.into();
        if !self.depends_on.contains(&step_id) {
            self.depends_on.push(step_id);
        }
        self
    }

    pub fn with_estimate(mut self, estimate: impl Into<String>) -> Self {
        self.estimated_time = estimate.into();
        self
    }

    pub fn parallel(mut self, can_parallel: bool) -> Self {
        self.can_parallel = can_parallel;
        self
    }

    pub fn with_priority(mut self, priority: StepPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn critical(mut self) -> Self {
        self.critical = true;
        self
    }
}

/// Rough duration of a function, as an estimate string.
pub fn estimate_step_time(function: &str) -> &'static str {
    match function {
        "load_context" => "~1s",
        "create_post" => "~30s",
        "backup_database" => "~2m",
        "generate_workflow" => "~1m",
        "execute_workflow" => "~30s",
        _ => "~5s",
    }
}

/// Whether a function may share a level with others.
pub fn can_function_parallel(function: &str) -> bool {
    !matches!(function, "backup_database" | "load_context")
}
