use crate::{
    context::BusinessContext, llm::ChatMessage, prompt::builder::build_suggestion_prompt,
};

pub fn generate_suggestion_messages(context: Option<&BusinessContext>, limit: usize) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(build_suggestion_prompt(context, limit)),
        ChatMessage::user("Suggest next actions based on the current context."),
    ]
}
