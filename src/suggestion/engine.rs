use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::{
    context::{BusinessContext, ContextProvider},
    error::{CopilotError, Result},
    llm::{ChatModel, CompletionRequest, complete_json},
    message::suggestion::generate_suggestion_messages,
    services::{BACKUP_FUNCTION, ExecutionLogStore, SuggestionStore},
    suggestion::{
        model::{
            RankFilters, Suggestion, SuggestionFilters, SuggestionPriority, SuggestionSource,
            SuggestionType,
        },
        scoring::{ScoringContext, apply_filters, rank, score_all},
    },
    utils::humanize_identifier,
};

const BACKUP_REMINDER_DAYS: f64 = 7.0;
const BACKUP_URGENT_DAYS: f64 = 14.0;
const NEVER_BACKED_UP_DAYS: f64 = 999.0;
const MAX_PATTERN_SUGGESTIONS: usize = 3;
/// Entries of execution history consulted for usage patterns.
const PATTERN_WINDOW: usize = 50;

#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub user_id: Option<String>,
    pub project_id: Option<String>,
    pub limit: usize,
    pub include_context: bool,
    pub rank: RankFilters,
    pub filters: SuggestionFilters,
    /// Upsert the returned suggestions into the store.
    pub persist: bool,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            user_id: None,
            project_id: None,
            limit: 10,
            include_context: true,
            rank: RankFilters::default(),
            filters: SuggestionFilters::default(),
            persist: false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ModelSuggestion {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    priority: Option<String>,
    reason: String,
    suggested_action: ModelAction,
    #[serde(default)]
    estimated_impact: Option<String>,
    #[serde(default)]
    project_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelAction {
    action: String,
    #[serde(default)]
    parameters: Value,
}

/// Proactive follow-up suggestions from context, usage patterns and the model.
pub struct SuggestionEngine {
    model: Arc<dyn ChatModel>,
    context: Arc<dyn ContextProvider>,
    store: Option<Arc<dyn SuggestionStore>>,
    logs: Option<Arc<dyn ExecutionLogStore>>,
}

impl SuggestionEngine {
    pub fn new(model: Arc<dyn ChatModel>, context: Arc<dyn ContextProvider>) -> Self {
        Self {
            model,
            context,
            store: None,
            logs: None,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn SuggestionStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_execution_logs(mut self, logs: Arc<dyn ExecutionLogStore>) -> Self {
        self.logs = Some(logs);
        self
    }

    /// generate → score → rank → filter → limit.
    pub async fn generate(&self, options: &GenerateOptions) -> Vec<Suggestion> {
        let per_source = (options.limit * 2 / 3).max(1);
        let context = self.context.load().await;

        let mut suggestions = Vec::new();
        if options.include_context {
            suggestions.extend(self.context_based(&context, per_source).await);
        }
        suggestions.extend(self.pattern_based(&context, per_source).await);
        let ai_context = options.include_context.then_some(context.as_ref());
        suggestions.extend(self.ai_generated(ai_context, per_source).await);
        debug!("generated {} candidate suggestions", suggestions.len());

        score_all(
            &mut suggestions,
            &ScoringContext {
                user_id: options.user_id.clone(),
                project_id: options.project_id.clone(),
            },
        );
        let ranked = rank(suggestions, &options.rank);
        let mut result = apply_filters(ranked, &options.filters);
        result.truncate(options.limit);

        if options.persist
            && let Some(store) = &self.store
            && let Err(e) = store.upsert(&result).await
        {
            warn!("failed to persist {} suggestions: {}", result.len(), e);
        }

        info!("returning {} suggestions", result.len());
        result
    }

    /// A post for the first current project and a backup reminder when the
    /// last backup is older than a week.
    pub async fn context_based(&self, context: &BusinessContext, limit: usize) -> Vec<Suggestion> {
        let mut suggestions = Vec::new();

        if let Some(project) = context.current_projects.first() {
            suggestions.push(
                Suggestion::new(
                    SuggestionType::Action,
                    SuggestionPriority::Medium,
                    SuggestionSource::Context,
                    format!("Tạo bài post mới cho dự án \"{}\"", project.name),
                    "create_post",
                    json!({
                        "topic": format!("dự án {}", project.name),
                        "platform": "all",
                        "project_id": project.id,
                    }),
                )
                .with_project(project.id.clone(), project.name.clone())
                .with_impact("Tăng cường marketing cho dự án"),
            );
        }

        let days = self.days_since_backup(Utc::now()).await;
        if days > BACKUP_REMINDER_DAYS {
            let priority = if days > BACKUP_URGENT_DAYS {
                SuggestionPriority::High
            } else {
                SuggestionPriority::Medium
            };
            suggestions.push(
                Suggestion::new(
                    SuggestionType::Reminder,
                    priority,
                    SuggestionSource::Context,
                    format!("Chưa backup database {} ngày", days.floor() as i64),
                    BACKUP_FUNCTION,
                    json!({}),
                )
                .with_impact("Bảo vệ dữ liệu quan trọng"),
            );
        }

        suggestions.truncate(limit);
        suggestions
    }

    async fn days_since_backup(&self, now: DateTime<Utc>) -> f64 {
        let Some(logs) = &self.logs else {
            return NEVER_BACKED_UP_DAYS;
        };
        match logs.last_backup_at().await {
            Ok(Some(at)) => (now - at).num_seconds() as f64 / 86_400.0,
            Ok(None) => NEVER_BACKED_UP_DAYS,
            Err(e) => {
                warn!("could not read last backup time: {}", e);
                NEVER_BACKED_UP_DAYS
            }
        }
    }

    /// Functions run at least twice recently, most frequent first.
    pub async fn pattern_based(&self, context: &BusinessContext, limit: usize) -> Vec<Suggestion> {
        let mut functions: Vec<String> = context
            .recent_executions
            .iter()
            .filter_map(|e| e.function().map(str::to_string))
            .collect();

        if let Some(logs) = &self.logs {
            match logs.recent(PATTERN_WINDOW).await {
                Ok(entries) => functions.extend(
                    entries
                        .into_iter()
                        .filter(|e| e.function != "execute_plan")
                        .map(|e| e.function),
                ),
                Err(e) => warn!("could not read execution history: {}", e),
            }
        }

        let mut counts: HashMap<String, usize> = HashMap::new();
        for function in functions {
            *counts.entry(function).or_default() += 1;
        }
        let mut frequent: Vec<(String, usize)> = counts.into_iter().filter(|(_, n)| *n >= 2).collect();
        frequent.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        frequent
            .into_iter()
            .take(MAX_PATTERN_SUGGESTIONS.min(limit))
            .map(|(function, count)| {
                Suggestion::new(
                    SuggestionType::Action,
                    SuggestionPriority::Medium,
                    SuggestionSource::Pattern,
                    format!("Bạn thường chạy \"{}\" ({} lần gần đây)", humanize_identifier(&function), count),
                    function,
                    json!({}),
                )
                .with_impact("Dựa trên thói quen của bạn")
            })
            .collect()
    }

    /// Model-proposed suggestions; any failure yields none.
    pub async fn ai_generated(&self, context: Option<&BusinessContext>, limit: usize) -> Vec<Suggestion> {
        let messages = generate_suggestion_messages(context, limit);
        let response = match complete_json(
            self.model.as_ref(),
            CompletionRequest::new(messages).with_temperature(0.8),
        )
        .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("model suggestions unavailable: {}", e);
                return Vec::new();
            }
        };

        let Some(Value::Array(entries)) = response.get("suggestions") else {
            return Vec::new();
        };

        entries
            .iter()
            .filter_map(|entry| serde_json::from_value::<ModelSuggestion>(entry.clone()).ok())
            .take(limit)
            .map(|entry| {
                let kind = entry
                    .kind
                    .as_deref()
                    .and_then(SuggestionType::parse)
                    .unwrap_or(SuggestionType::Insight);
                let priority = entry
                    .priority
                    .as_deref()
                    .and_then(SuggestionPriority::parse)
                    .unwrap_or(SuggestionPriority::Medium);

                let mut suggestion = Suggestion::new(
                    kind,
                    priority,
                    SuggestionSource::Ai,
                    entry.reason,
                    entry.suggested_action.action,
                    entry.suggested_action.parameters,
                );
                suggestion.estimated_impact = entry.estimated_impact;
                suggestion.project_id = entry.project_id;
                suggestion
            })
            .collect()
    }

    fn store(&self) -> Result<&Arc<dyn SuggestionStore>> {
        self.store
            .as_ref()
            .ok_or_else(|| CopilotError::Store("no suggestion store configured".to_string()).into())
    }

    /// Marks a stored suggestion dismissed. Returns false when it is unknown.
    pub async fn dismiss(&self, suggestion_id: &str, user_id: Option<&str>) -> Result<bool> {
        let store = self.store()?;
        let Some(mut suggestion) = store.get(suggestion_id).await? else {
            return Ok(false);
        };
        suggestion.dismissed_at = Some(Utc::now());
        suggestion.dismissed_by = user_id.map(str::to_string);
        store.upsert(std::slice::from_ref(&suggestion)).await?;
        info!("suggestion {} dismissed", suggestion_id);
        Ok(true)
    }

    pub async fn mark_executed(&self, suggestion_id: &str) -> Result<bool> {
        let store = self.store()?;
        let Some(mut suggestion) = store.get(suggestion_id).await? else {
            return Ok(false);
        };
        suggestion.executed_at = Some(Utc::now());
        store.upsert(std::slice::from_ref(&suggestion)).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::{
        context::{ExecutionRef, ProjectRef},
        llm::ScriptedModel,
        services::{ExecutionLogEntry, InMemoryExecutionLogStore, InMemorySuggestionStore},
    };

    fn context() -> BusinessContext {
        BusinessContext {
            current_projects: vec![ProjectRef::new("p1", "Sabo Arena")],
            recent_executions: vec![
                ExecutionRef {
                    input_data: Some(json!({"function": "get_stats"})),
                },
                ExecutionRef {
                    input_data: Some(json!({"function": "get_stats"})),
                },
                ExecutionRef {
                    input_data: Some(json!({"function": "create_post"})),
                },
            ],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn context_suggestions_include_stale_backup_reminder() {
        let logs = Arc::new(InMemoryExecutionLogStore::new());
        let mut backup = ExecutionLogEntry::new(BACKUP_FUNCTION, "success");
        backup.created_at = Utc::now() - Duration::days(10);
        logs.append(backup).await.unwrap();

        let engine = SuggestionEngine::new(Arc::new(ScriptedModel::new()), Arc::new(context()))
            .with_execution_logs(logs);
        let suggestions = engine.context_based(&context(), 5).await;

        assert_eq!(suggestions.len(), 2);
        assert_eq!(suggestions[0].suggested_action.parameters["project_id"], "p1");
        assert_eq!(suggestions[1].kind, SuggestionType::Reminder);
        assert_eq!(suggestions[1].priority, SuggestionPriority::Medium);
        assert_eq!(suggestions[1].reason, "Chưa backup database 10 ngày");
    }

    #[tokio::test]
    async fn generate_ranks_all_sources_and_persists() {
        let model = Arc::new(ScriptedModel::new());
        model.push_completion(
            r#"{"suggestions": [
                {"type": "insight", "priority": "low", "reason": "Traffic dipped",
                 "suggested_action": {"action": "get_stats"}},
                {"reason": "missing action"}
            ]}"#,
        );
        let store = Arc::new(InMemorySuggestionStore::new());
        let engine = SuggestionEngine::new(model, Arc::new(context())).with_store(store.clone());

        let suggestions = engine
            .generate(&GenerateOptions {
                persist: true,
                ..Default::default()
            })
            .await;

        // Backup reminder (never backed up), project post, get_stats pattern, model insight.
        assert_eq!(suggestions.len(), 4);
        assert_eq!(suggestions[0].priority, SuggestionPriority::High);
        assert!(suggestions.windows(2).all(|w| w[0].score >= w[1].score));
        assert_eq!(suggestions.last().map(|s| s.source), Some(SuggestionSource::Ai));
        assert_eq!(store.list().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn dismissed_suggestions_drop_out() {
        let store = Arc::new(InMemorySuggestionStore::new());
        let engine = SuggestionEngine::new(Arc::new(ScriptedModel::new()), Arc::new(context()))
            .with_store(store.clone());

        let suggestion = engine.context_based(&context(), 1).await.remove(0);
        store.upsert(std::slice::from_ref(&suggestion)).await.unwrap();

        assert!(engine.dismiss(&suggestion.id, Some("u1")).await.unwrap());
        assert!(!engine.dismiss("suggestion-missing", None).await.unwrap());

        let stored = store.get(&suggestion.id).await.unwrap().unwrap();
        assert_eq!(stored.dismissed_by.as_deref(), Some("u1"));
        assert!(apply_filters(vec![stored], &SuggestionFilters::default()).is_empty());
    }
}
