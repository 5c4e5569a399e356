use serde_json::Value;

use crate::{
    context::BusinessContext,
    orchestration::agent_types::AgentTypeInfo,
    parser::ParsedCall,
    utils::truncate_chars,
};

fn list_or_none(items: Vec<String>) -> String {
    if items.is_empty() {
        "None".to_string()
    } else {
        items.join(", ")
    }
}

pub fn build_context_prompt(context: &BusinessContext, default_project: Option<&str>) -> String {
    let projects = list_or_none(
        context
            .current_projects
            .iter()
            .map(|p| match &p.slug {
                Some(slug) => format!("{} (id: {}, slug: {})", p.name, p.id, slug),
                None => format!("{} (id: {})", p.name, p.id),
            })
            .collect(),
    );
    let workflows = list_or_none(context.recent_workflows.iter().map(|w| w.name.clone()).collect());
    let commands = list_or_none(
        context
            .recent_commands(5)
            .into_iter()
            .map(|c| format!("\"{}\"", c))
            .collect(),
    );
    let current = default_project
        .map(|id| {
            let name = context.find_project(id).map(|p| p.name.as_str()).unwrap_or(id);
            format!("\n- Current project: {}", name)
        })
        .unwrap_or_default();

    format!(
        r#"Business context:
- Domain: {}
- Projects: {}
- Recent workflows: {}
- Recent commands: {}{}"#,
        context.domain, projects, workflows, commands, current
    )
}

pub fn build_parser_prompt(
    context: &BusinessContext,
    default_project: Option<&str>,
    user_context: Option<&Value>,
) -> String {
    let extra = user_context
        .map(|value| format!("\n\nCaller context: {}", value))
        .unwrap_or_default();

    format!(
        r#"You turn business commands into function calls.
Pick every function the command asks for; a command may need several.
When the command names a project, pass its id as "project_id".

{}{}"#,
        build_context_prompt(context, default_project),
        extra
    )
}

pub fn build_decomposition_prompt(context: &BusinessContext, project_id: Option<&str>) -> String {
    format!(
        r#"You are a planning system. Break commands into atomic execution steps.

{}

Rules:
1. Each step does exactly one thing.
2. Steps may depend on other steps through "dependsOn".
3. Independent steps may run in parallel ("canParallel": true).
4. Give a realistic "estimatedTime" such as "~5s" or "~2m".
5. "priority" is high, medium or low.

Return JSON: {{"steps": [{{"id", "name", "description", "function", "arguments", "estimatedTime", "canParallel", "dependsOn", "priority"}}]}}"#,
        build_context_prompt(context, project_id)
    )
}

pub fn build_decomposition_request(command: &str, calls: &[ParsedCall]) -> String {
    let functions = calls
        .iter()
        .enumerate()
        .map(|(i, call)| format!("{}. {}({})", i + 1, call.function, call.arguments))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Command: \"{}\"\n\nParsed functions:\n{}\n\nList the execution steps.",
        command, functions
    )
}

pub fn build_agent_selection_prompt(
    catalog: &[AgentTypeInfo],
    project_id: Option<&str>,
    available: &[String],
) -> String {
    let agents = catalog
        .iter()
        .map(|info| {
            format!(
                "- {}: {} ({})",
                info.agent_type.as_str(),
                info.description,
                info.capabilities.join(", ")
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let mut context = String::new();
    if let Some(project_id) = project_id {
        context.push_str(&format!("\n- Project ID: {}", project_id));
    }
    if !available.is_empty() {
        context.push_str(&format!("\n- Available agents: {}", available.join(", ")));
    }

    format!(
        r#"You select the agents best suited to a command.

Available agents:
{}

Context:{}

Choose by capability, not keywords alone. Prefer agents that can work in parallel.
Return JSON: {{"agents": [{{"type", "confidence" (0-1), "reason", "role", "canParallel"}}]}}"#,
        agents,
        if context.is_empty() { " none".to_string() } else { context }
    )
}

pub fn build_agent_task_prompt(agent: &str, role: &str, previous: &[(String, Value)]) -> String {
    let history = previous
        .iter()
        .map(|(agent, result)| {
            let text = result.to_string();
            format!("- {}: {}", agent, truncate_chars(&text, 100))
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are the {} agent. Your role: {}.\n\nResults from other agents:\n{}",
        agent,
        role,
        if history.is_empty() { "None".to_string() } else { history }
    )
}

pub fn build_synthesis_prompt(command: &str, results: &[(String, Value)]) -> String {
    let outputs = results
        .iter()
        .map(|(agent, result)| format!("## {}\n{}", agent, result))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        r#"Several agents worked on the command "{}".

{}

Merge their outputs into one coherent result.
Return JSON: {{"summary": "...", "highlights": [...], "nextSteps": [...]}}"#,
        command, outputs
    )
}

pub fn build_suggestion_prompt(context: Option<&BusinessContext>, limit: usize) -> String {
    let context = context
        .map(|c| {
            format!(
                "- Projects: {}\n- Recent workflows: {}",
                list_or_none(c.current_projects.iter().map(|p| p.name.clone()).collect()),
                c.recent_workflows.len()
            )
        })
        .unwrap_or_else(|| "No context available".to_string());

    format!(
        r#"Propose {} useful follow-up actions the user can take right now.

Context:
{}

Each suggestion has "type" (action|reminder|insight), "priority" (high|medium|low), "reason",
"suggested_action" {{"action", "parameters"}} and "estimated_impact".
Return JSON: {{"suggestions": [...]}}"#,
        limit, context
    )
}
