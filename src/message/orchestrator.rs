use serde_json::Value;

use crate::{
    llm::ChatMessage,
    orchestration::agent_types::AgentTypeInfo,
    prompt::builder::{
        build_agent_selection_prompt, build_agent_task_prompt, build_synthesis_prompt,
    },
};

pub fn generate_selection_messages(
    command: &str,
    catalog: &[AgentTypeInfo],
    project_id: Option<&str>,
    available: &[String],
) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(build_agent_selection_prompt(catalog, project_id, available)),
        ChatMessage::user(format!("Command: \"{}\"", command)),
    ]
}

pub fn generate_agent_task_messages(
    command: &str,
    agent: &str,
    role: &str,
    previous: &[(String, Value)],
) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(build_agent_task_prompt(agent, role, previous)),
        ChatMessage::user(command),
    ]
}

pub fn generate_synthesis_messages(command: &str, results: &[(String, Value)]) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system("You merge the work of several agents into one answer. Output JSON only."),
        ChatMessage::user(build_synthesis_prompt(command, results)),
    ]
}
