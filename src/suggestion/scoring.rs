use chrono::{DateTime, Utc};

use crate::suggestion::model::{RankFilters, ScoreBreakdown, Suggestion, SuggestionFilters};

/// Impact phrases that earn the impact bonus.
const IMPACT_KEYWORDS: &[&str] = &["quan trọng", "tăng", "giảm", "cải thiện", "important", "increase", "reduce", "improve"];

const RECENCY_MAX: f64 = 50.0;
const RECENCY_DECAY_PER_HOUR: f64 = 2.0;
const CURRENT_PROJECT_BONUS: f64 = 30.0;
const NAMED_PROJECT_BONUS: f64 = 20.0;
const IMPACT_BONUS: f64 = 20.0;
const DISMISSED_PENALTY: f64 = 100.0;

#[derive(Debug, Clone, Default)]
pub struct ScoringContext {
    pub user_id: Option<String>,
    pub project_id: Option<String>,
}

fn recency(created_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    match created_at {
        Some(created_at) => {
            let age_hours = (now - created_at).num_milliseconds() as f64 / 3_600_000.0;
            (RECENCY_MAX - age_hours * RECENCY_DECAY_PER_HOUR).clamp(0.0, RECENCY_MAX)
        }
        None => RECENCY_MAX,
    }
}

fn has_high_impact(impact: Option<&str>) -> bool {
    impact
        .map(|text| {
            let text = text.to_lowercase();
            IMPACT_KEYWORDS.iter().any(|k| text.contains(k))
        })
        .unwrap_or(false)
}

/// Composite score as of `now`, floored at zero.
pub fn score_at(suggestion: &Suggestion, ctx: &ScoringContext, now: DateTime<Utc>) -> (f64, ScoreBreakdown) {
    let current_project = match (&suggestion.project_id, &ctx.project_id) {
        (Some(a), Some(b)) if a == b => CURRENT_PROJECT_BONUS,
        _ => 0.0,
    };
    let named_project = if suggestion.project_name.is_some() { NAMED_PROJECT_BONUS } else { 0.0 };

    let breakdown = ScoreBreakdown {
        priority: suggestion.priority.weight(),
        recency: recency(suggestion.created_at, now),
        context: current_project + named_project,
        kind: suggestion.kind.weight(),
        source: suggestion.source.weight(),
        impact: if has_high_impact(suggestion.estimated_impact.as_deref()) { IMPACT_BONUS } else { 0.0 },
        dismissed_penalty: if suggestion.is_dismissed() { DISMISSED_PENALTY } else { 0.0 },
    };

    let total = breakdown.priority + breakdown.recency + breakdown.context + breakdown.kind + breakdown.source
        + breakdown.impact
        - breakdown.dismissed_penalty;

    (total.max(0.0), breakdown)
}

pub fn score(suggestion: &Suggestion, ctx: &ScoringContext) -> (f64, ScoreBreakdown) {
    score_at(suggestion, ctx, Utc::now())
}

/// Fills `score` and `scoring` on every suggestion.
pub fn score_all(suggestions: &mut [Suggestion], ctx: &ScoringContext) {
    let now = Utc::now();
    for suggestion in suggestions.iter_mut() {
        let (total, breakdown) = score_at(suggestion, ctx, now);
        suggestion.score = total;
        suggestion.scoring = Some(breakdown);
    }
}

/// Sorts by score, highest first, then keeps exact priority matches when a
/// priority is given, otherwise exact type matches when a type is given.
pub fn rank(mut suggestions: Vec<Suggestion>, filters: &RankFilters) -> Vec<Suggestion> {
    suggestions.sort_by(|a, b| b.score.total_cmp(&a.score));

    if let Some(priority) = filters.priority {
        suggestions.retain(|s| s.priority == priority);
    } else if let Some(kind) = filters.kind {
        suggestions.retain(|s| s.kind == kind);
    }
    suggestions
}

pub fn apply_filters(suggestions: Vec<Suggestion>, filters: &SuggestionFilters) -> Vec<Suggestion> {
    suggestions
        .into_iter()
        .filter(|s| filters.min_priority.is_none_or(|min| s.priority >= min))
        .filter(|s| match (&filters.project_id, &s.project_id) {
            (Some(wanted), Some(project)) => wanted == project,
            _ => true,
        })
        .filter(|s| filters.include_dismissed || !s.is_dismissed())
        .filter(|s| match (filters.since, s.created_at) {
            (Some(since), Some(created_at)) => created_at >= since,
            _ => true,
        })
        .collect()
}
