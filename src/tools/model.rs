use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One callable capability offered to the function-calling model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSpec {
    pub name: String,
    pub description: String,
    /// JSON schema of the argument object.
    pub parameters: Value,
}

impl FunctionSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }

    /// OpenAI-style `tools[]` entry.
    pub fn to_tool_definition(&self) -> Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
            }
        })
    }
}

/// Looks a function up by name.
pub fn find_function<'a>(catalog: &'a [FunctionSpec], name: &str) -> Option<&'a FunctionSpec> {
    catalog.iter().find(|spec| spec.name == name)
}
