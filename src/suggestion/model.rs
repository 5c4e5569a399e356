use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionPriority {
    Low,
    Medium,
    High,
}

impl SuggestionPriority {
    pub fn weight(self) -> f64 {
        match self {
            SuggestionPriority::High => 100.0,
            SuggestionPriority::Medium => 50.0,
            SuggestionPriority::Low => 25.0,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionType {
    Action,
    Reminder,
    Insight,
}

impl SuggestionType {
    pub fn weight(self) -> f64 {
        match self {
            SuggestionType::Action => 40.0,
            SuggestionType::Reminder => 30.0,
            SuggestionType::Insight => 20.0,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "action" => Some(Self::Action),
            "reminder" => Some(Self::Reminder),
            "insight" => Some(Self::Insight),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionSource {
    Context,
    Pattern,
    Ai,
}

impl SuggestionSource {
    pub fn weight(self) -> f64 {
        match self {
            SuggestionSource::Context => 40.0,
            SuggestionSource::Pattern => 35.0,
            SuggestionSource::Ai => 30.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestedAction {
    pub action: String,
    #[serde(default)]
    pub parameters: Value,
}

/// Per-factor breakdown of a suggestion's score.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub priority: f64,
    pub recency: f64,
    pub context: f64,
    #[serde(rename = "type")]
    pub kind: f64,
    pub source: f64,
    pub impact: f64,
    pub dismissed_penalty: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: SuggestionType,
    pub priority: SuggestionPriority,
    pub reason: String,
    pub suggested_action: SuggestedAction,
    #[serde(default)]
    pub estimated_impact: Option<String>,
    #[serde(default)]
    pub score: f64,
    pub source: SuggestionSource,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub dismissed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub dismissed_by: Option<String>,
    #[serde(default)]
    pub executed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scoring: Option<ScoreBreakdown>,
}

impl Suggestion {
    pub fn new(
        kind: SuggestionType,
        priority: SuggestionPriority,
        source: SuggestionSource,
        reason: impl Into<String>,
        action: impl Into<String>,
        parameters: Value,
    ) -> Self {
        Self {
            id: format!("suggestion-{}", uuid::Uuid::new_v4()),
            kind,
            priority,
            reason: reason.into(),
            suggested_action: SuggestedAction {
                action: action.into(),
                parameters,
            },
            estimated_impact: None,
            score: 0.0,
            source,
            project_id: None,
            project_name: None,
            created_at: Some(Utc::now()),
            dismissed_at: None,
            dismissed_by: None,
            executed_at: None,
            scoring: None,
        }
    }

    pub fn with_impact(mut self, impact: impl Into<String>) -> Self {
        self.estimated_impact = Some(impact.into());
        self
    }

    pub fn with_project(mut self, project_id: impl Into<String>, project_name: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self.project_name = Some(project_name.into());
        self
    }

    pub fn with_created_at(mut self, created_at: Option<DateTime<Utc>>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn is_dismissed(&self) -> bool {
        self.dismissed_at.is_some()
    }
}

/// Exact-match filters applied while ranking.
#[derive(Debug, Clone, Default)]
pub struct RankFilters {
    pub priority: Option<SuggestionPriority>,
    pub kind: Option<SuggestionType>,
}

/// Filters applied after ranking, before truncation.
#[derive(Debug, Clone, Default)]
pub struct SuggestionFilters {
    pub min_priority: Option<SuggestionPriority>,
    pub project_id: Option<String>,
    pub include_dismissed: bool,
    pub since: Option<DateTime<Utc>>,
}
