use crate::{
    context::BusinessContext,
    llm::ChatMessage,
    parser::ParsedCall,
    prompt::builder::{build_decomposition_prompt, build_decomposition_request},
};

pub fn generate_decomposition_messages(
    command: &str,
    calls: &[ParsedCall],
    context: &BusinessContext,
    project_id: Option<&str>,
) -> Vec<ChatMessage> {
    let system_message = ChatMessage::system(build_decomposition_prompt(context, project_id));
    let user_message = ChatMessage::user(build_decomposition_request(command, calls));
    vec![system_message, user_message]
}
