pub mod openai;
pub mod scripted;
pub mod stream;
pub mod types;

use async_trait::async_trait;
use futures::{StreamExt, stream::BoxStream};
use serde_json::Value;

pub use openai::OpenAiClient;
pub use scripted::ScriptedModel;
pub use stream::FunctionCallAccumulator;
pub use types::{
    ChatMessage, CompletionRequest, FunctionCall, FunctionCallDelta, ResponseFormat, Role,
};

use crate::{error::Result, tools::FunctionSpec, utils::parse_json_content};

pub type FunctionCallStream = BoxStream<'static, Result<FunctionCallDelta>>;

/// Seam to the language model. Every method is an await point.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Plain completion; returns the assistant message text.
    async fn complete(&self, request: CompletionRequest) -> Result<String>;

    /// Function-calling request. The model may choose zero or more functions.
    async fn call_functions(
        &self,
        messages: Vec<ChatMessage>,
        functions: &[FunctionSpec],
    ) -> Result<Vec<FunctionCall>>;

    /// Streamed function calling. Models without native streaming replay the
    /// non-streaming answer as one fragment per call.
    async fn stream_function_calls(
        &self,
        messages: Vec<ChatMessage>,
        functions: &[FunctionSpec],
    ) -> Result<FunctionCallStream> {
        let calls = self.call_functions(messages, functions).await?;
        let deltas: Vec<Result<FunctionCallDelta>> = calls
            .into_iter()
            .enumerate()
            .map(|(index, call)| {
                Ok(FunctionCallDelta {
                    index,
                    id: call.id,
                    name: Some(call.name),
                    arguments_fragment: call.arguments.to_string(),
                })
            })
            .collect();
        Ok(futures::stream::iter(deltas).boxed())
    }
}

/// Completion in JSON mode, parsed into a value.
pub async fn complete_json(model: &dyn ChatModel, request: CompletionRequest) -> Result<Value> {
    let content = model.complete(request.json()).await?;
    Ok(parse_json_content(&content)?)
}

/// Drains a call stream into complete calls.
pub async fn collect_function_calls(mut stream: FunctionCallStream) -> Result<Vec<FunctionCall>> {
    let mut accumulator = FunctionCallAccumulator::new();
    while let Some(delta) = stream.next().await {
        accumulator.push(delta?);
    }
    Ok(accumulator.finish())
}
