use std::{collections::VecDeque, sync::Mutex, time::Duration};

use async_trait::async_trait;

use crate::{
    error::{Error, Result},
    llm::{
        ChatModel,
        types::{ChatMessage, CompletionRequest, FunctionCall},
    },
    tools::FunctionSpec,
};

/// Deterministic model that replays queued answers, for tests and offline demos.
///
/// Queued answers are consumed in order. Once a queue is empty the fallback
/// answer is used, or a model error is returned when none is set.
#[derive(Default)]
pub struct ScriptedModel {
    completions: Mutex<VecDeque<Result<String>>>,
    function_calls: Mutex<VecDeque<Result<Vec<FunctionCall>>>>,
    fallback_completion: Option<String>,
    latency: Option<Duration>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fallback_completion(mut self, content: impl Into<String>) -> Self {
        self.fallback_completion = Some(content.into());
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn push_completion(&self, content: impl Into<String>) -> &Self {
        lock(&self.completions).push_back(Ok(content.into()));
        self
    }

    pub fn push_completion_error(&self, message: impl Into<String>) -> &Self {
        lock(&self.completions).push_back(Err(Error::model(message)));
        self
    }

    pub fn push_function_calls(&self, calls: Vec<FunctionCall>) -> &Self {
        lock(&self.function_calls).push_back(Ok(calls));
        self
    }

    pub fn push_function_call_error(&self, message: impl Into<String>) -> &Self {
        lock(&self.function_calls).push_back(Err(Error::model(message)));
        self
    }

    /// Every message list the model has been sent, oldest first.
    pub fn recorded_requests(&self) -> Vec<Vec<ChatMessage>> {
        lock(&self.requests).clone()
    }

    fn record(&self, messages: &[ChatMessage]) {
        lock(&self.requests).push(messages.to_vec());
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        self.record(&request.messages);
        self.simulate_latency().await;
        let next = lock(&self.completions).pop_front();
        match next {
            Some(answer) => answer,
            None => self
                .fallback_completion
                .clone()
                .ok_or_else(|| Error::model("no scripted completion left")),
        }
    }

    async fn call_functions(
        &self,
        messages: Vec<ChatMessage>,
        _functions: &[FunctionSpec],
    ) -> Result<Vec<FunctionCall>> {
        self.record(&messages);
        self.simulate_latency().await;
        let next = lock(&self.function_calls).pop_front();
        next.unwrap_or_else(|| Err(Error::model("no scripted function calls left")))
    }
}
