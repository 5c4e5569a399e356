use std::collections::HashMap;

use serde_json::Value;

use crate::execution::state::StepResult;

/// Arguments after reference substitution.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedArguments {
    pub value: Value,
    /// Reference expressions (without `${}`) that could not be resolved and
    /// were left in place.
    pub unresolved: Vec<String>,
}

/// Prior step outcomes keyed by step id, as JSON.
pub struct ReferenceScope {
    outcomes: HashMap<String, Value>,
}

impl ReferenceScope {
    pub fn from_results(results: &[StepResult]) -> Self {
        let outcomes = results
            .iter()
            .filter_map(|r| {
                serde_json::to_value(&r.result)
                    .ok()
                    .map(|value| (r.step_id.clone(), value))
            })
            .collect();
        Self { outcomes }
    }

    /// Resolves `step-1.result.workflowId`: the first segment names a step,
    /// the rest walk into its outcome. Numeric segments index arrays.
    pub fn lookup(&self, expression: &str) -> Option<&Value> {
        let mut segments = expression.split('.');
        let step_id = segments.next()?.trim();
        let mut value = self.outcomes.get(step_id)?;
        for segment in segments {
            let segment = segment.trim();
            value = match value {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        if value.is_null() { None } else { Some(value) }
    }

    pub fn resolve(&self, arguments: &Value) -> ResolvedArguments {
        let mut unresolved = Vec::new();
        let value = self.resolve_value(arguments, &mut unresolved);
        ResolvedArguments { value, unresolved }
    }

    fn resolve_value(&self, value: &Value, unresolved: &mut Vec<String>) -> Value {
        match value {
            Value::String(text) => self.resolve_string(text, unresolved),
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.resolve_value(item, unresolved))
                    .collect(),
            ),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(key, item)| (key.clone(), self.resolve_value(item, unresolved)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    fn resolve_string(&self, text: &str, unresolved: &mut Vec<String>) -> Value {
        // A string that is exactly one reference keeps the referenced type.
        if let Some(expression) = whole_reference(text) {
            return match self.lookup(expression) {
                Some(value) => value.clone(),
                None => {
                    unresolved.push(expression.to_string());
                    Value::String(text.to_string())
                }
            };
        }

        let mut output = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find("${") {
            let Some(len) = rest[start..].find('}') else {
                break;
            };
            let expression = &rest[start + 2..start + len];
            output.push_str(&rest[..start]);
            match self.lookup(expression) {
                Some(Value::String(s)) => output.push_str(s),
                Some(other) => output.push_str(&other.to_string()),
                None => {
                    unresolved.push(expression.to_string());
                    output.push_str(&rest[start..=start + len]);
                }
            }
            rest = &rest[start + len + 1..];
        }
        output.push_str(rest);
        Value::String(output)
    }
}

fn whole_reference(text: &str) -> Option<&str> {
    let inner = text.strip_prefix("${")?.strip_suffix('}')?;
    (!inner.contains('}') && !inner.contains("${")).then_some(inner)
}

/// Substitutes `${stepId.path}` references against prior results.
pub fn resolve_arguments(arguments: &Value, results: &[StepResult]) -> ResolvedArguments {
    ReferenceScope::from_results(results).resolve(arguments)
}
