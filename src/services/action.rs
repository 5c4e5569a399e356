use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{Error, Result};

/// Intent name meaning "no executable action, just talk".
pub const CHAT_INTENT: &str = "chat";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedIntent {
    pub action: String,
    pub reasoning: String,
    #[serde(default)]
    pub parameters: Value,
}

impl DetectedIntent {
    pub fn chat() -> Self {
        Self {
            action: CHAT_INTENT.to_string(),
            reasoning: "no executable action detected".to_string(),
            parameters: json!({}),
        }
    }

    pub fn is_actionable(&self) -> bool {
        !self.action.is_empty() && self.action != CHAT_INTENT
    }
}

/// Dynamic action dispatch used when no built-in handler matches.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn detect_intent(&self, command: &str) -> Result<DetectedIntent>;

    async fn execute_action(&self, action: &str, params: &Value) -> Result<Value>;
}

/// Keyword-rule intent detection over a fixed table of known actions.
#[derive(Default)]
pub struct KeywordActionExecutor {
    rules: Vec<(String, String)>,
    actions: Vec<(String, Value)>,
    executed: Mutex<Vec<(String, Value)>>,
}

impl KeywordActionExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands containing `keyword` (case-insensitive) resolve to `action`.
    pub fn with_rule(mut self, keyword: &str, action: &str) -> Self {
        self.rules.push((keyword.to_lowercase(), action.to_string()));
        self
    }

    /// Registers an action and the payload it returns when executed.
    pub fn with_action(mut self, action: &str, result: Value) -> Self {
        self.actions.push((action.to_string(), result));
        self
    }

    pub fn executed(&self) -> Vec<(String, Value)> {
        self.executed
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ActionExecutor for KeywordActionExecutor {
    async fn detect_intent(&self, command: &str) -> Result<DetectedIntent> {
        let lowered = command.to_lowercase();
        let intent = self
            .rules
            .iter()
            .find(|(keyword, _)| lowered.contains(keyword.as_str()))
            .map(|(keyword, action)| DetectedIntent {
                action: action.clone(),
                reasoning: format!("command mentions \"{}\"", keyword),
                parameters: json!({}),
            })
            .unwrap_or_else(DetectedIntent::chat);
        Ok(intent)
    }

    async fn execute_action(&self, action: &str, params: &Value) -> Result<Value> {
        let Some((_, result)) = self.actions.iter().find(|(name, _)| name == action) else {
            return Err(Error::collaborator(format!("unknown action: {}", action)));
        };

        if let Ok(mut executed) = self.executed.lock() {
            executed.push((action.to_string(), params.clone()));
        }
        Ok(json!({
            "type": "action_executed",
            "action": action,
            "result": result,
        }))
    }
}
