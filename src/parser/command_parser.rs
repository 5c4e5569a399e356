use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{
    context::ContextProvider,
    error::{CopilotError, Result},
    input::ParseOptions,
    llm::{ChatModel, FunctionCall, collect_function_calls},
    message::parser::generate_parser_messages,
    parser::{
        ContextUsed, ParseOutcome, ParsedCall,
        enrichment::{Enrichment, enrich_arguments},
    },
    tools::{FunctionSpec, find_function},
};

const REPHRASE_SUGGESTION: &str =
    "Try rephrasing the command, e.g. \"create a post about X\" or \"backup database\".";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseMode {
    #[default]
    NonStreaming,
    Streaming,
}

/// Maps free-text commands onto catalog functions through the model.
pub struct CommandParser {
    model: Arc<dyn ChatModel>,
    context: Arc<dyn ContextProvider>,
    mode: ParseMode,
}

impl CommandParser {
    pub fn new(model: Arc<dyn ChatModel>, context: Arc<dyn ContextProvider>) -> Self {
        Self {
            model,
            context,
            mode: ParseMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: ParseMode) -> Self {
        self.mode = mode;
        self
    }

    /// Parses one command. A model transport failure is an error; a command
    /// that maps to no function is a failed outcome with a rephrase hint.
    pub async fn parse(
        &self,
        command: &str,
        catalog: &[FunctionSpec],
        options: &ParseOptions,
    ) -> Result<ParseOutcome> {
        let command = command.trim();
        if command.is_empty() {
            return Ok(ParseOutcome::failure(
                CopilotError::ParseError("command is empty".into()).to_string(),
                REPHRASE_SUGGESTION,
                ContextUsed::default(),
            ));
        }

        let context = self.context.load().await;
        let default_project = options.project_id.as_deref();
        let context_used = ContextUsed {
            projects: context.current_projects.len(),
            workflows: context.recent_workflows.len(),
            default_project: options.project_id.clone(),
        };

        let messages = generate_parser_messages(
            command,
            &context,
            default_project,
            options.user_context.as_ref(),
        );

        let calls = match self.mode {
            ParseMode::NonStreaming => self.model.call_functions(messages, catalog).await?,
            ParseMode::Streaming => {
                let stream = self.model.stream_function_calls(messages, catalog).await?;
                collect_function_calls(stream).await?
            }
        };
        debug!("model returned {} call(s) for \"{}\"", calls.len(), command);

        let tool_calls: Vec<ParsedCall> = calls
            .into_iter()
            .filter(|call| known_function(catalog, call))
            .enumerate()
            .map(|(index, call)| {
                let mut arguments = call.arguments;
                if let Enrichment::Ambiguous(ids) =
                    enrich_arguments(&mut arguments, command, &context, default_project)
                {
                    warn!(
                        "command \"{}\" mentions several projects equally ({}), not inferring one",
                        command,
                        ids.join(", ")
                    );
                }
                ParsedCall {
                    id: call.id.unwrap_or_else(|| format!("call-{}", index + 1)),
                    function: call.name,
                    arguments,
                }
            })
            .collect();

        if tool_calls.is_empty() {
            info!("no function identified for \"{}\"", command);
            return Ok(ParseOutcome::failure(
                CopilotError::NoFunctionIdentified.to_string(),
                REPHRASE_SUGGESTION,
                context_used,
            ));
        }

        info!(
            "parsed \"{}\" into {}",
            command,
            tool_calls
                .iter()
                .map(|c| c.function.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(ParseOutcome {
            success: true,
            tool_calls,
            error: None,
            suggestion: None,
            context_used,
        })
    }
}

fn known_function(catalog: &[FunctionSpec], call: &FunctionCall) -> bool {
    if find_function(catalog, &call.name).is_some() {
        return true;
    }
    warn!("model chose unknown function {}, dropping it", call.name);
    false
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        context::{BusinessContext, ProjectRef},
        llm::ScriptedModel,
        tools::default_catalog,
    };

    fn context() -> Arc<BusinessContext> {
        Arc::new(BusinessContext {
            current_projects: vec![ProjectRef::new("p1", "Sabo Arena")],
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn parses_multiple_calls_and_enriches_them() {
        let model = Arc::new(ScriptedModel::new());
        model.push_function_calls(vec![
            FunctionCall::new("create_post", json!({"topic": "billiards"})),
            FunctionCall::new("backup_database", json!({"destination": "google_drive"})),
        ]);
        let parser = CommandParser::new(model.clone(), context());

        let outcome = parser
            .parse("tạo bài post cho Sabo Arena và backup database", &default_catalog(), &ParseOptions::default())
            .await
            .unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.tool_calls.len(), 2);
        assert_eq!(outcome.tool_calls[0].id, "call-1");
        assert_eq!(outcome.tool_calls[0].arguments["project_id"], "p1");
        assert_eq!(outcome.context_used.projects, 1);

        let system = &model.recorded_requests()[0][0].content;
        assert!(system.contains("Sabo Arena"));
    }

    #[tokio::test]
    async fn zero_calls_is_a_user_facing_failure() {
        let model = Arc::new(ScriptedModel::new());
        model.push_function_calls(vec![FunctionCall::new("launch_rocket", json!({}))]);
        let parser = CommandParser::new(model, context());

        let outcome = parser
            .parse("hello there", &default_catalog(), &ParseOptions::default())
            .await
            .unwrap();

        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("no function identified"));
        assert!(outcome.suggestion.is_some());
    }

    #[tokio::test]
    async fn empty_command_never_reaches_the_model() {
        let model = Arc::new(ScriptedModel::new());
        let parser = CommandParser::new(model.clone(), context());

        let outcome = parser.parse("   ", &default_catalog(), &ParseOptions::default()).await.unwrap();
        assert!(!outcome.success);
        assert!(model.recorded_requests().is_empty());
    }

    #[tokio::test]
    async fn streaming_mode_accumulates_calls() {
        let model = Arc::new(ScriptedModel::new());
        model.push_function_calls(vec![FunctionCall::new("get_stats", json!({"type": "today"}))]);
        let parser = CommandParser::new(model, context()).with_mode(ParseMode::Streaming);

        let outcome = parser
            .parse("thống kê hôm nay", &default_catalog(), &ParseOptions::with_project("p1"))
            .await
            .unwrap();

        assert_eq!(outcome.tool_calls[0].arguments["type"], "today");
        assert_eq!(outcome.tool_calls[0].arguments["project_id"], "p1");
    }

    #[tokio::test]
    async fn model_failure_is_an_error() {
        let model = Arc::new(ScriptedModel::new());
        model.push_function_call_error("network unreachable");
        let parser = CommandParser::new(model, context());

        assert!(parser.parse("backup database", &default_catalog(), &ParseOptions::default()).await.is_err());
    }
}
