use std::collections::VecDeque;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::{
    error::{Error, Result},
    llm::{
        ChatModel, FunctionCallStream,
        types::{ChatMessage, CompletionRequest, FunctionCall, FunctionCallDelta, ResponseFormat},
    },
    shared::global_context::ModelConfig,
    tools::FunctionSpec,
    utils::truncate_chars,
};

/// Client for any OpenAI-compatible `/chat/completions` endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
}

impl OpenAiClient {
    pub fn new(api_key: &str, base_url: &str, model: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            temperature: 0.3,
        }
    }

    pub fn from_config(config: &ModelConfig) -> Self {
        let mut client = Self::new(
            config.api_key.as_deref().unwrap_or_default(),
            &config.base_url,
            &config.model,
        );
        client.temperature = config.temperature;
        client
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    async fn post(&self, body: Value) -> Result<reqwest::Response> {
        let mut request = self.http.post(self.endpoint()).json(&body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::model(format!(
                "{} from model endpoint: {}",
                status,
                truncate_chars(&text, 300)
            )));
        }
        Ok(response)
    }

    fn base_body(&self, messages: &[ChatMessage]) -> Value {
        json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
        })
    }

    fn tools_body(&self, messages: &[ChatMessage], functions: &[FunctionSpec]) -> Value {
        let mut body = self.base_body(messages);
        body["tools"] = Value::Array(functions.iter().map(FunctionSpec::to_tool_definition).collect());
        body["tool_choice"] = json!("auto");
        body
    }
}

fn first_message(response: &Value) -> Result<&Value> {
    response
        .pointer("/choices/0/message")
        .ok_or_else(|| Error::model("response has no choices"))
}

fn parse_arguments(raw: Option<&Value>) -> Value {
    match raw {
        Some(Value::String(text)) if !text.trim().is_empty() => serde_json::from_str(text)
            .unwrap_or_else(|e| {
                warn!("malformed tool arguments from model: {}", e);
                json!({})
            }),
        Some(Value::Object(map)) => Value::Object(map.clone()),
        _ => json!({}),
    }
}

fn parse_tool_calls(message: &Value) -> Vec<FunctionCall> {
    message
        .get("tool_calls")
        .and_then(Value::as_array)
        .map(|calls| {
            calls
                .iter()
                .filter_map(|call| {
                    let function = call.get("function")?;
                    let name = function.get("name")?.as_str()?.to_string();
                    Some(FunctionCall {
                        id: call.get("id").and_then(Value::as_str).map(str::to_string),
                        name,
                        arguments: parse_arguments(function.get("arguments")),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

fn parse_stream_chunk(data: &str) -> Vec<FunctionCallDelta> {
    let chunk: Value = match serde_json::from_str(data) {
        Ok(chunk) => chunk,
        Err(e) => {
            warn!("skipping malformed stream chunk: {}", e);
            return Vec::new();
        }
    };
    chunk
        .pointer("/choices/0/delta/tool_calls")
        .and_then(Value::as_array)
        .map(|calls| {
            calls
                .iter()
                .map(|call| FunctionCallDelta {
                    index: call.get("index").and_then(Value::as_u64).unwrap_or(0) as usize,
                    id: call.get("id").and_then(Value::as_str).map(str::to_string),
                    name: call
                        .pointer("/function/name")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    arguments_fragment: call
                        .pointer("/function/arguments")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                })
                .collect()
        })
        .unwrap_or_default()
}

struct SseState {
    inner: futures::stream::BoxStream<'static, reqwest::Result<Vec<u8>>>,
    /// Raw bytes of the current incomplete line.
    buffer: Vec<u8>,
    pending: VecDeque<FunctionCallDelta>,
    done: bool,
}

impl SseState {
    fn new(inner: futures::stream::BoxStream<'static, reqwest::Result<Vec<u8>>>) -> Self {
        Self {
            inner,
            buffer: Vec::new(),
            pending: VecDeque::new(),
            done: false,
        }
    }

    /// Buffers a network chunk. Lines are decoded only once complete, so a
    /// character split across chunks survives.
    fn push_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
        self.drain_lines();
    }

    fn drain_lines(&mut self) {
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = match String::from_utf8(raw) {
                Ok(line) => line,
                Err(e) => {
                    warn!("skipping stream line that is not valid UTF-8: {}", e);
                    continue;
                }
            };
            let Some(data) = line.trim().strip_prefix("data:") else {
                continue;
            };
            let data = data.trim();
            if data == "[DONE]" {
                self.done = true;
                return;
            }
            self.pending.extend(parse_stream_chunk(data));
        }
    }
}

#[async_trait]
impl ChatModel for OpenAiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let mut body = self.base_body(&request.messages);
        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if request.response_format == ResponseFormat::JsonObject {
            body["response_format"] = json!({ "type": "json_object" });
        }

        let response: Value = self.post(body).await?.json().await?;
        let content = first_message(&response)?
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        debug!("model completion: {} chars", content.len());
        Ok(content)
    }

    async fn call_functions(
        &self,
        messages: Vec<ChatMessage>,
        functions: &[FunctionSpec],
    ) -> Result<Vec<FunctionCall>> {
        let body = self.tools_body(&messages, functions);
        let response: Value = self.post(body).await?.json().await?;
        let calls = parse_tool_calls(first_message(&response)?);
        debug!("model selected {} function(s)", calls.len());
        Ok(calls)
    }

    async fn stream_function_calls(
        &self,
        messages: Vec<ChatMessage>,
        functions: &[FunctionSpec],
    ) -> Result<FunctionCallStream> {
        let mut body = self.tools_body(&messages, functions);
        body["stream"] = json!(true);
        let response = self.post(body).await?;

        let state = SseState::new(response.bytes_stream().map(|chunk| chunk.map(|b| b.to_vec())).boxed());

        let stream = futures::stream::unfold(state, |mut state| async move {
            loop {
                if let Some(delta) = state.pending.pop_front() {
                    return Some((Ok(delta), state));
                }
                if state.done {
                    return None;
                }
                match state.inner.next().await {
                    Some(Ok(bytes)) => state.push_bytes(&bytes),
                    Some(Err(e)) => {
                        state.done = true;
                        return Some((Err(Error::from(e)), state));
                    }
                    None => state.done = true,
                }
            }
        });

        Ok(stream.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tool_calls_with_string_arguments() {
        let message = json!({
            "tool_calls": [
                { "id": "call_1", "function": { "name": "backup_database", "arguments": "{\"destination\":\"google_drive\"}" } },
                { "id": "call_2", "function": { "name": "get_stats", "arguments": "" } }
            ]
        });
        let calls = parse_tool_calls(&message);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].arguments["destination"], "google_drive");
        assert_eq!(calls[1].arguments, json!({}));
    }

    #[test]
    fn parses_stream_chunk() {
        let data = r#"{"choices":[{"delta":{"tool_calls":[{"index":1,"function":{"name":"get_stats","arguments":"{\"ty"}}]}}]}"#;
        let deltas = parse_stream_chunk(data);
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].index, 1);
        assert_eq!(deltas[0].name.as_deref(), Some("get_stats"));
        assert_eq!(deltas[0].arguments_fragment, "{\"ty");
    }

    #[test]
    fn split_characters_survive_chunk_boundaries() {
        let line = "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"name\":\"create_post\",\"arguments\":\"{\\\"topic\\\":\\\"tạo bài\\\"}\"}}]}}]}\n";
        let bytes = line.as_bytes();
        let split = line.find('ạ').unwrap() + 1;

        let mut state = SseState::new(futures::stream::empty().boxed());
        state.push_bytes(&bytes[..split]);
        assert!(state.pending.is_empty());
        state.push_bytes(&bytes[split..]);
        state.push_bytes(b"data: [DONE]\n");

        assert_eq!(state.pending.len(), 1);
        assert_eq!(state.pending[0].arguments_fragment, "{\"topic\":\"tạo bài\"}");
        assert!(state.done);
    }
}
