use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRef {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
}

impl ProjectRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            slug: None,
        }
    }

    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_data: Option<Value>,
}

impl ExecutionRef {
    /// The command text this execution was started from, if it was recorded.
    pub fn command(&self) -> Option<&str> {
        self.input_data
            .as_ref()
            .and_then(|data| data.get("command"))
            .and_then(Value::as_str)
    }

    /// The function this execution ran, if it was recorded.
    pub fn function(&self) -> Option<&str> {
        self.input_data
            .as_ref()
            .and_then(|data| data.get("function"))
            .and_then(Value::as_str)
    }
}

/// Snapshot of business state used to ground parsing, planning and suggestions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessContext {
    pub domain: String,
    #[serde(default)]
    pub current_projects: Vec<ProjectRef>,
    #[serde(default)]
    pub recent_workflows: Vec<WorkflowRef>,
    #[serde(default)]
    pub recent_executions: Vec<ExecutionRef>,
    #[serde(default)]
    pub business_goals: Vec<String>,
    #[serde(default)]
    pub constraints: Vec<String>,
    #[serde(default)]
    pub stats: Value,
}

impl Default for BusinessContext {
    fn default() -> Self {
        Self {
            domain: "general".to_string(),
            current_projects: Vec::new(),
            recent_workflows: Vec::new(),
            recent_executions: Vec::new(),
            business_goals: Vec::new(),
            constraints: Vec::new(),
            stats: Value::Object(Default::default()),
        }
    }
}

impl BusinessContext {
    pub fn find_project(&self, project_id: &str) -> Option<&ProjectRef> {
        self.current_projects.iter().find(|p| p.id == project_id)
    }

    /// Most recent command texts, newest first, deduplicated.
    pub fn recent_commands(&self, limit: usize) -> Vec<&str> {
        let mut seen = Vec::new();
        for command in self.recent_executions.iter().filter_map(ExecutionRef::command) {
            if !seen.contains(&command) {
                seen.push(command);
            }
            if seen.len() == limit {
                break;
            }
        }
        seen
    }
}
