pub mod engine;
pub mod model;
pub mod scoring;

pub use engine::{GenerateOptions, SuggestionEngine};
pub use model::{
    RankFilters, ScoreBreakdown, SuggestedAction, Suggestion, SuggestionFilters, SuggestionPriority,
    SuggestionSource, SuggestionType,
};
pub use scoring::{ScoringContext, apply_filters, rank, score, score_all};
