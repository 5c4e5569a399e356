use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::{
    error::Result,
    llm::{ChatModel, CompletionRequest, complete_json},
    message::orchestrator::generate_synthesis_messages,
    orchestration::{
        agent_types::AgentType,
        task::{TaskResult, TaskStatus},
    },
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentOutput {
    pub agent: AgentType,
    pub status: TaskStatus,
    pub result: Option<Value>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Synthesis {
    pub summary: String,
    pub final_result: Value,
    pub synthesized: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedResult {
    pub success: bool,
    pub total_agents: usize,
    pub successful_agents: usize,
    pub failed_agents: usize,
    pub agent_results: Vec<AgentOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synthesis: Option<Synthesis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_result: Option<Value>,
}

/// Merges agent results. More than one success triggers model synthesis,
/// whose failure only omits the synthesis.
pub async fn aggregate_results(model: &dyn ChatModel, command: &str, results: &[TaskResult]) -> AggregatedResult {
    let successful: Vec<&TaskResult> = results.iter().filter(|r| r.is_success()).collect();
    let failed_agents = results.iter().filter(|r| r.status == TaskStatus::Failed).count();

    let mut aggregated = AggregatedResult {
        success: failed_agents == 0,
        total_agents: results.len(),
        successful_agents: successful.len(),
        failed_agents,
        agent_results: results
            .iter()
            .map(|r| AgentOutput {
                agent: r.agent,
                status: r.status,
                result: r.result.clone(),
                error: r.error.clone(),
            })
            .collect(),
        synthesis: None,
        summary: None,
        final_result: None,
    };

    match successful.as_slice() {
        [] => {}
        [only] => {
            aggregated.summary = Some(format!("Agent {} completed successfully", only.agent));
            aggregated.final_result = only.result.clone();
        }
        many => match synthesize(model, command, many).await {
            Ok(synthesis) => {
                aggregated.summary = Some(synthesis.summary.clone());
                aggregated.synthesis = Some(synthesis);
            }
            Err(e) => warn!("synthesis failed, returning raw agent results: {}", e),
        },
    }

    aggregated
}

pub async fn synthesize(model: &dyn ChatModel, command: &str, results: &[&TaskResult]) -> Result<Synthesis> {
    let outputs: Vec<(String, Value)> = results
        .iter()
        .map(|r| (r.agent.to_string(), r.result.clone().unwrap_or(Value::Null)))
        .collect();

    let messages = generate_synthesis_messages(command, &outputs);
    let content = complete_json(model, CompletionRequest::new(messages).with_temperature(0.5)).await?;

    let summary = content
        .get("summary")
        .and_then(Value::as_str)
        .unwrap_or("Results synthesized")
        .to_string();
    let final_result = content.get("finalResult").cloned().unwrap_or(content);

    Ok(Synthesis {
        summary,
        final_result,
        synthesized: true,
    })
}
