use std::collections::BTreeMap;

use serde_json::Value;
use tracing::warn;

use crate::llm::types::{FunctionCall, FunctionCallDelta};

#[derive(Debug, Default)]
struct PartialCall {
    id: Option<String>,
    name: String,
    arguments: String,
}

/// Folds streamed call fragments back into complete calls.
#[derive(Debug, Default)]
pub struct FunctionCallAccumulator {
    calls: BTreeMap<usize, PartialCall>,
}

impl FunctionCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, delta: FunctionCallDelta) {
        let entry = self.calls.entry(delta.index).or_default();
        if delta.id.is_some() {
            entry.id = delta.id;
        }
        if let Some(name) = delta.name {
            entry.name.push_str(&name);
        }
        entry.arguments.push_str(&delta.arguments_fragment);
    }

    /// Calls in index order. Argument text that is not valid JSON becomes an
    /// empty object.
    pub fn finish(self) -> Vec<FunctionCall> {
        self.calls
            .into_values()
            .filter(|call| !call.name.is_empty())
            .map(|call| {
                let arguments = if call.arguments.trim().is_empty() {
                    Value::Object(Default::default())
                } else {
                    serde_json::from_str(&call.arguments).unwrap_or_else(|e| {
                        warn!("discarding malformed streamed arguments for {}: {}", call.name, e);
                        Value::Object(Default::default())
                    })
                };
                FunctionCall {
                    id: call.id,
                    name: call.name,
                    arguments,
                }
            })
            .collect()
    }
}
