use serde_json::Value;

use crate::{
    context::BusinessContext, llm::ChatMessage, prompt::builder::build_parser_prompt,
};

pub fn generate_parser_messages(
    command: &str,
    context: &BusinessContext,
    default_project: Option<&str>,
    user_context: Option<&Value>,
) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(build_parser_prompt(context, default_project, user_context)),
        ChatMessage::user(command),
    ]
}
