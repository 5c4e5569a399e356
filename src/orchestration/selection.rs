use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    error::{CopilotError, Result},
    llm::{ChatModel, CompletionRequest, complete_json},
    message::orchestrator::generate_selection_messages,
    orchestration::{
        agent_types::{AGENT_CATALOG, AgentType},
        registry::{AgentRegistry, TypeAvailability},
    },
};

/// An agent chosen for a command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedAgent {
    #[serde(rename = "type")]
    pub agent_type: AgentType,
    pub capabilities: Vec<String>,
    pub confidence: f64,
    pub reason: String,
    pub role: String,
    pub can_parallel: bool,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
}

impl SelectedAgent {
    pub fn new(agent_type: AgentType, confidence: f64, reason: &str, role: &str) -> Self {
        Self {
            agent_type,
            capabilities: agent_type.info().capabilities.iter().map(|c| c.to_string()).collect(),
            confidence: confidence.clamp(0.0, 1.0),
            reason: reason.to_string(),
            role: role.to_string(),
            can_parallel: true,
            available: true,
            agent_id: None,
        }
    }

    pub fn sequential(mut self) -> Self {
        self.can_parallel = false;
        self
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelAgent {
    #[serde(rename = "type")]
    agent_type: String,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    can_parallel: Option<bool>,
}

/// Keyword table: any keyword selects the agent.
const KEYWORD_RULES: &[(&[&str], AgentType, f64, &str, &str, bool)] = &[
    (
        &["content", "bài", "post"],
        AgentType::ContentCreator,
        0.8,
        "Command requires content creation",
        "Generate content",
        true,
    ),
    (
        &["seo", "keyword"],
        AgentType::SeoSpecialist,
        0.9,
        "Command requires SEO expertise",
        "SEO optimization",
        true,
    ),
    (
        &["thống kê", "analytics", "stats"],
        AgentType::DataAnalyst,
        0.85,
        "Command requires data analysis",
        "Analyze data",
        true,
    ),
    (
        &["workflow", "automation"],
        AgentType::WorkflowAutomation,
        0.9,
        "Command requires workflow automation",
        "Create/optimize workflow",
        false,
    ),
];

/// Deterministic selection from command keywords. Never fails; may be empty.
pub fn fallback_selection(command: &str) -> Vec<SelectedAgent> {
    let command = command.to_lowercase();
    KEYWORD_RULES
        .iter()
        .filter(|(keywords, ..)| keywords.iter().any(|k| command.contains(k)))
        .map(|(_, agent_type, confidence, reason, role, can_parallel)| {
            let agent = SelectedAgent::new(*agent_type, *confidence, reason, role);
            if *can_parallel { agent } else { agent.sequential() }
        })
        .collect()
}

/// Asks the model for agents. Unknown types and types whose registered
/// instances are all down are dropped; any failure falls back to keywords.
pub async fn select_agents(
    model: &dyn ChatModel,
    registry: &AgentRegistry,
    command: &str,
    project_id: Option<&str>,
) -> Vec<SelectedAgent> {
    match select_with_model(model, registry, command, project_id).await {
        Ok(agents) => agents,
        Err(e) => {
            warn!("agent selection failed, using keyword fallback: {}", e);
            fallback_selection(command)
        }
    }
}

async fn select_with_model(
    model: &dyn ChatModel,
    registry: &AgentRegistry,
    command: &str,
    project_id: Option<&str>,
) -> Result<Vec<SelectedAgent>> {
    let available: Vec<String> = registry
        .available_types()
        .await
        .iter()
        .map(|t| t.as_str().to_string())
        .collect();

    let messages = generate_selection_messages(command, &AGENT_CATALOG, project_id, &available);
    let response = complete_json(model, CompletionRequest::new(messages).with_temperature(0.3)).await?;

    let entries = match response.get("agents") {
        Some(Value::Array(entries)) => entries.clone(),
        Some(_) => {
            return Err(CopilotError::ParseError("\"agents\" is not an array".to_string()).into());
        }
        None => Vec::new(),
    };

    let mut agents = verify_agents(registry, entries).await;
    agents.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    Ok(agents)
}

async fn verify_agents(registry: &AgentRegistry, entries: Vec<Value>) -> Vec<SelectedAgent> {
    let mut verified = Vec::new();

    for entry in entries {
        let Ok(candidate) = serde_json::from_value::<ModelAgent>(entry) else {
            debug!("skipping malformed agent entry");
            continue;
        };
        let Some(agent_type) = AgentType::parse(&candidate.agent_type) else {
            debug!("dropping unknown agent type {}", candidate.agent_type);
            continue;
        };
        if verified.iter().any(|a: &SelectedAgent| a.agent_type == agent_type) {
            continue;
        }

        let agent_id = match registry.availability(agent_type).await {
            TypeAvailability::Unavailable => {
                warn!("dropping {}: no live instance", agent_type);
                continue;
            }
            TypeAvailability::Available => registry
                .runtime_for(agent_type, None)
                .await
                .map(|(info, _)| info.id),
            TypeAvailability::Unregistered => None,
        };

        let reason = candidate.reason.unwrap_or_default();
        let role = candidate.role.filter(|r| !r.is_empty()).unwrap_or_else(|| reason.clone());
        let mut agent = SelectedAgent::new(agent_type, candidate.confidence.unwrap_or(0.5), &reason, &role);
        agent.can_parallel = candidate.can_parallel.unwrap_or(true);
        agent.agent_id = agent_id;
        verified.push(agent);
    }

    verified
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        llm::ScriptedModel,
        orchestration::registry::{AgentInfo, AgentStatus},
    };

    #[test]
    fn keyword_fallback_matches_the_rule_table() {
        let agents = fallback_selection("Tạo bài post SEO và workflow automation");
        let types: Vec<_> = agents.iter().map(|a| a.agent_type).collect();
        assert_eq!(
            types,
            vec![AgentType::ContentCreator, AgentType::SeoSpecialist, AgentType::WorkflowAutomation]
        );
        assert!(!agents[2].can_parallel);
        assert!(fallback_selection("hello there").is_empty());
    }

    #[tokio::test]
    async fn model_selection_is_verified_and_sorted() {
        let model = ScriptedModel::new();
        model.push_completion(
            r#"{"agents": [
                {"type": "content_creator", "confidence": 0.7, "reason": "writes", "role": "Write"},
                {"type": "janitor", "confidence": 0.99},
                {"type": "seo_specialist", "confidence": 0.95, "reason": "ranks", "canParallel": true},
                {"type": "data_analyst", "confidence": 0.9}
            ]}"#,
        );
        let registry = AgentRegistry::default();
        registry
            .register(AgentInfo::new("analyst-1", AgentType::DataAnalyst))
            .await
            .unwrap();
        registry.update_status("analyst-1", AgentStatus::Offline).await.unwrap();

        let agents = select_agents(&model, &registry, "write an seo post", None).await;
        let types: Vec<_> = agents.iter().map(|a| a.agent_type).collect();
        assert_eq!(types, vec![AgentType::SeoSpecialist, AgentType::ContentCreator]);
        assert_eq!(agents[0].role, "ranks");
    }

    #[tokio::test]
    async fn model_failure_uses_keywords() {
        let model = Arc::new(ScriptedModel::new());
        model.push_completion_error("connection reset");

        let agents = select_agents(model.as_ref(), &AgentRegistry::default(), "show stats", None).await;
        assert_eq!(agents.len(), 1);
        assert_eq!(agents[0].agent_type, AgentType::DataAnalyst);
        assert_eq!(agents[0].confidence, 0.85);
    }
}
