use std::collections::BTreeMap;

use crate::error::ValidationError;
use crate::models::{
    round1, AnswerShape, AnswerValue, NormalizedAnswer, QuestionKind, Questionnaire, RawAnswer,
    RespondentContext, ScoringInput, ScoringMode, ScoringResult,
};

use super::{answer_field, classify_answers, is_blank, mean, validate_common, ResponseStrategy, StrategyKind};

const DEFAULT_DIMENSION: &str = "general";

/// Likert inventories: per-dimension means of scale answers
#[derive(Debug, Clone, Copy, Default)]
pub struct PersonalityStrategy;

impl ResponseStrategy for PersonalityStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Personality
    }

    fn requires_ai(&self) -> bool {
        false
    }

    /// Optional or not, every scale item must be rated or the profile is skewed
    fn validate(&self, questionnaire: &Questionnaire, answers: &[RawAnswer]) -> Vec<ValidationError> {
        let mut errors = validate_common(questionnaire, answers);

        for question in questionnaire
            .questions
            .iter()
            .filter(|q| q.kind == QuestionKind::Scale && !q.required)
        {
            let rated = answers
                .iter()
                .any(|a| a.question_id == question.question_id && !is_blank(&a.value));
            if !rated {
                errors.push(ValidationError::new(
                    answer_field(&question.question_id),
                    "every inventory item must be rated",
                ));
            }
        }

        errors
    }

    /// Flip reverse-scored items so higher always means more of the trait
    fn normalize(&self, questionnaire: &Questionnaire, answers: &[RawAnswer]) -> Vec<NormalizedAnswer> {
        let mut normalized = classify_answers(questionnaire, answers);

        for answer in normalized.iter_mut() {
            let reverse = questionnaire
                .question(&answer.question_id)
                .is_some_and(|q| q.reverse_scored);
            if !reverse {
                continue;
            }

            if let (Some(value), Some(scale)) = (answer.metadata.numeric_value, answer.metadata.scale) {
                let flipped = scale.min + scale.max - value;
                answer.metadata.numeric_value = Some(flipped);
                answer.value = AnswerValue::Number(flipped);
            }
        }

        normalized
    }

    fn score(&self, input: &ScoringInput<'_>, _respondent: &RespondentContext) -> ScoringResult {
        let mut by_dimension: BTreeMap<String, Vec<f64>> = BTreeMap::new();

        for answer in input.answers.iter().filter(|a| a.shape == AnswerShape::Numeric) {
            let (Some(value), Some(scale)) = (answer.metadata.numeric_value, answer.metadata.scale)
            else {
                continue;
            };
            let dimension = answer
                .dimension
                .clone()
                .unwrap_or_else(|| DEFAULT_DIMENSION.to_string());
            by_dimension
                .entry(dimension)
                .or_default()
                .push(scale.fraction(value));
        }

        let answered: usize = by_dimension.values().map(Vec::len).sum();
        let dimensions: BTreeMap<String, f64> = by_dimension
            .into_iter()
            .filter_map(|(dimension, values)| {
                mean(values).map(|m| (dimension, round1(m * 100.0)))
            })
            .collect();

        let overall = mean(dimensions.values().copied()).unwrap_or(0.0);

        let mut notes = Vec::new();
        let unrated = input.answers.len() - answered;
        if unrated > 0 {
            notes.push(format!("{} answer(s) were not scale ratings and were ignored", unrated));
        }

        ScoringResult {
            strategy: self.kind().to_string(),
            overall: round1(overall),
            dimensions,
            mode: ScoringMode::Full,
            answered,
            notes,
        }
    }
}
