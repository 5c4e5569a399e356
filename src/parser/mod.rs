pub mod command_parser;
pub mod enrichment;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use command_parser::{CommandParser, ParseMode};
pub use enrichment::{Enrichment, enrich_arguments};

/// One resolved invocation intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedCall {
    pub id: String,
    pub function: String,
    pub arguments: Value,
}

impl ParsedCall {
    pub fn new(id: impl Into<String>, function: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            function: function.into(),
            arguments,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextUsed {
    pub projects: usize,
    pub workflows: usize,
    pub default_project: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseOutcome {
    pub success: bool,
    #[serde(rename = "toolCalls")]
    pub tool_calls: Vec<ParsedCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    pub context_used: ContextUsed,
}

impl ParseOutcome {
    pub fn failure(error: impl Into<String>, suggestion: impl Into<String>, context_used: ContextUsed) -> Self {
        Self {
            success: false,
            tool_calls: Vec::new(),
            error: Some(error.into()),
            suggestion: Some(suggestion.into()),
            context_used,
        }
    }
}
