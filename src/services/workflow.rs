use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};
use tokio::sync::RwLock;
use tracing::info;

use crate::{
    context::BusinessContext,
    error::{Error, Result},
    utils::humanize_identifier,
};

/// Builds and runs workflow artifacts. Artifacts are opaque JSON graphs.
#[async_trait]
pub trait WorkflowService: Send + Sync {
    async fn generate_from_command(
        &self,
        function: &str,
        arguments: &Value,
        context: &BusinessContext,
    ) -> Result<Value>;

    async fn execute_workflow(&self, workflow_id: &str, input: &Value) -> Result<Value>;
}

/// Keeps generated artifacts in memory and "executes" them by recording a run.
#[derive(Default)]
pub struct InMemoryWorkflowService {
    workflows: Arc<RwLock<HashMap<String, Value>>>,
    runs: Arc<RwLock<Vec<Value>>>,
}

impl InMemoryWorkflowService {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn workflow(&self, workflow_id: &str) -> Option<Value> {
        self.workflows.read().await.get(workflow_id).cloned()
    }

    pub async fn runs(&self) -> Vec<Value> {
        self.runs.read().await.clone()
    }
}

#[async_trait]
impl WorkflowService for InMemoryWorkflowService {
    async fn generate_from_command(
        &self,
        function: &str,
        arguments: &Value,
        context: &BusinessContext,
    ) -> Result<Value> {
        let id = format!("wf-{}", uuid::Uuid::new_v4());
        let name = arguments
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| humanize_identifier(function));

        let artifact = json!({
            "id": id,
            "name": name,
            "domain": context.domain,
            "nodes": [
                { "id": "trigger", "type": "manual" },
                { "id": "action", "type": function, "parameters": arguments },
            ],
            "connections": [{ "from": "trigger", "to": "action" }],
            "createdAt": Utc::now().to_rfc3339(),
        });

        self.workflows.write().await.insert(id.clone(), artifact.clone());
        info!("Workflow {} generated for {}", id, function);
        Ok(artifact)
    }

    async fn execute_workflow(&self, workflow_id: &str, input: &Value) -> Result<Value> {
        if !self.workflows.read().await.contains_key(workflow_id) {
            return Err(Error::collaborator(format!("workflow not found: {}", workflow_id)));
        }

        let run = json!({
            "id": format!("run-{}", uuid::Uuid::new_v4()),
            "workflowId": workflow_id,
            "status": "success",
            "input": input,
        });
        self.runs.write().await.push(run.clone());
        Ok(run)
    }
}
