pub mod general;
pub mod interview;
pub mod leadership;
pub mod normalize;
pub mod personality;
pub mod skills;
pub mod validation;

pub use general::*;
pub use interview::*;
pub use leadership::*;
pub use normalize::*;
pub use personality::*;
pub use skills::*;
pub use validation::*;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::models::{
    NormalizedAnswer, Questionnaire, RawAnswer, RespondentContext, ScoringInput, ScoringResult,
};

/// Closed set of questionnaire types with dedicated behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Fallback for unknown types: text-only, no AI
    General,
    Personality,
    Leadership,
    Interview,
    Skills,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::General => "general",
            StrategyKind::Personality => "personality",
            StrategyKind::Leadership => "leadership",
            StrategyKind::Interview => "interview",
            StrategyKind::Skills => "skills",
        }
    }

    /// Parse a questionnaire type classifier. Unknown types yield `None`.
    pub fn from_type(questionnaire_type: &str) -> Option<Self> {
        let normalized = questionnaire_type.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "general" | "survey" => Some(StrategyKind::General),
            "personality" | "big_five" | "psychometric" => Some(StrategyKind::Personality),
            "leadership" | "leadership_360" => Some(StrategyKind::Leadership),
            "interview" | "video_interview" | "audio_interview" => Some(StrategyKind::Interview),
            "skills" | "skills_assessment" | "technical" => Some(StrategyKind::Skills),
            _ => None,
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Behaviour set for one questionnaire type
///
/// Implementations are stateless and shared across concurrent resolutions.
/// `score` must be a pure function of its inputs: stage handlers may run it
/// more than once for the same response.
pub trait ResponseStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Whether the interpretation stages are part of this type's path
    fn requires_ai(&self) -> bool;

    /// Field-level errors; a non-empty result keeps the response out of the pipeline
    fn validate(&self, questionnaire: &Questionnaire, answers: &[RawAnswer]) -> Vec<ValidationError> {
        validate_common(questionnaire, answers)
    }

    fn normalize(&self, questionnaire: &Questionnaire, answers: &[RawAnswer]) -> Vec<NormalizedAnswer> {
        classify_answers(questionnaire, answers)
    }

    /// Score from whatever inputs are present. Missing interpretation or
    /// transcripts must produce a `Partial` result, never a panic.
    fn score(&self, input: &ScoringInput<'_>, respondent: &RespondentContext) -> ScoringResult;
}

/// Explicit map from type tag to behaviour set, with one fallback entry
#[derive(Clone)]
pub struct StrategyRegistry {
    strategies: HashMap<StrategyKind, Arc<dyn ResponseStrategy>>,
    fallback: Arc<dyn ResponseStrategy>,
}

impl StrategyRegistry {
    /// Registry with every built-in strategy and `general` as the fallback
    pub fn new() -> Self {
        Self::empty()
            .with_strategy(Arc::new(PersonalityStrategy))
            .with_strategy(Arc::new(LeadershipStrategy::default()))
            .with_strategy(Arc::new(InterviewStrategy::default()))
            .with_strategy(Arc::new(SkillsStrategy))
    }

    /// Registry that only knows the fallback
    pub fn empty() -> Self {
        let fallback: Arc<dyn ResponseStrategy> = Arc::new(GeneralStrategy::default());
        let mut strategies = HashMap::new();
        strategies.insert(StrategyKind::General, fallback.clone());
        Self {
            strategies,
            fallback,
        }
    }

    /// Register or replace the strategy for its kind
    pub fn with_strategy(mut self, strategy: Arc<dyn ResponseStrategy>) -> Self {
        self.strategies.insert(strategy.kind(), strategy);
        self
    }

    /// Resolve a type classifier; unknown types get the fallback
    pub fn resolve(&self, questionnaire_type: &str) -> Arc<dyn ResponseStrategy> {
        match StrategyKind::from_type(questionnaire_type) {
            Some(kind) => self.resolve_kind(kind),
            None => self.fallback.clone(),
        }
    }

    pub fn resolve_kind(&self, kind: StrategyKind) -> Arc<dyn ResponseStrategy> {
        self.strategies
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<_> = self.strategies.keys().map(|k| k.as_str()).collect();
        kinds.sort();
        f.debug_struct("StrategyRegistry")
            .field("strategies", &kinds)
            .field("fallback", &self.fallback.kind())
            .finish()
    }
}

/// Mean of the values, `None` when empty
pub(crate) fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// How close a word count gets to a target, capped at 1
pub(crate) fn depth_ratio(words: usize, target: usize) -> f64 {
    if target == 0 {
        return 1.0;
    }
    (words as f64 / target as f64).min(1.0)
}
