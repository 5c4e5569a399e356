use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::{
    error::{CopilotError, Error, Result},
    suggestion::model::Suggestion,
};

/// Persisted suggestions. Writes are upserts; the last writer wins.
#[async_trait]
pub trait SuggestionStore: Send + Sync {
    async fn upsert(&self, suggestions: &[Suggestion]) -> Result<()>;

    async fn get(&self, id: &str) -> Result<Option<Suggestion>>;

    async fn list(&self) -> Result<Vec<Suggestion>>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionLogEntry {
    pub id: String,
    pub function: String,
    pub status: String,
    #[serde(default)]
    pub plan_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub input_data: Value,
    #[serde(default)]
    pub output: Value,
    pub created_at: DateTime<Utc>,
}

impl ExecutionLogEntry {
    pub fn new(function: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            function: function.into(),
            status: status.into(),
            plan_id: None,
            user_id: None,
            project_id: None,
            input_data: Value::Null,
            output: Value::Null,
            created_at: Utc::now(),
        }
    }
}

/// Append-only execution history, including backup runs.
#[async_trait]
pub trait ExecutionLogStore: Send + Sync {
    async fn append(&self, entry: ExecutionLogEntry) -> Result<()>;

    /// Newest entries first.
    async fn recent(&self, limit: usize) -> Result<Vec<ExecutionLogEntry>>;

    async fn last_backup_at(&self) -> Result<Option<DateTime<Utc>>>;
}

pub const BACKUP_FUNCTION: &str = "backup_database";

#[derive(Default)]
pub struct InMemorySuggestionStore {
    suggestions: Arc<RwLock<HashMap<String, Suggestion>>>,
}

impl InMemorySuggestionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SuggestionStore for InMemorySuggestionStore {
    async fn upsert(&self, suggestions: &[Suggestion]) -> Result<()> {
        let mut stored = self.suggestions.write().await;
        for suggestion in suggestions {
            stored.insert(suggestion.id.clone(), suggestion.clone());
        }
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Suggestion>> {
        Ok(self.suggestions.read().await.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<Suggestion>> {
        Ok(self.suggestions.read().await.values().cloned().collect())
    }
}

#[derive(Default)]
pub struct InMemoryExecutionLogStore {
    entries: Arc<RwLock<Vec<ExecutionLogEntry>>>,
    capacity: Option<usize>,
}

impl InMemoryExecutionLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects appends once `capacity` entries are held.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Arc::default(),
            capacity: Some(capacity),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl ExecutionLogStore for InMemoryExecutionLogStore {
    async fn append(&self, entry: ExecutionLogEntry) -> Result<()> {
        let mut entries = self.entries.write().await;
        if let Some(capacity) = self.capacity
            && entries.len() >= capacity
        {
            return Err(Error::Copilot(CopilotError::Store(
                "execution log is full".into(),
            )));
        }
        entries.push(entry);
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<ExecutionLogEntry>> {
        let entries = self.entries.read().await;
        let mut recent: Vec<_> = entries.iter().cloned().collect();
        recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        recent.truncate(limit);
        Ok(recent)
    }

    async fn last_backup_at(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .filter(|entry| entry.function == BACKUP_FUNCTION)
            .map(|entry| entry.created_at)
            .max())
    }
}
