use std::collections::BTreeMap;

use crate::models::{
    round1, AnswerShape, RespondentContext, ScoringInput, ScoringMode, ScoringResult,
};

use super::{depth_ratio, is_blank, mean, ResponseStrategy, StrategyKind};

/// Fallback strategy: completion and written depth, no AI
#[derive(Debug, Clone)]
pub struct GeneralStrategy {
    /// Word count at which a written answer earns full depth
    pub depth_target_words: usize,
}

impl Default for GeneralStrategy {
    fn default() -> Self {
        Self {
            depth_target_words: 50,
        }
    }
}

impl ResponseStrategy for GeneralStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::General
    }

    fn requires_ai(&self) -> bool {
        false
    }

    fn score(&self, input: &ScoringInput<'_>, _respondent: &RespondentContext) -> ScoringResult {
        let total = input.answers.len();
        let answered = input.answers.iter().filter(|a| !is_blank(&a.value)).count();
        let completion = if total > 0 {
            answered as f64 / total as f64
        } else {
            0.0
        };

        let depth = mean(
            input
                .answers
                .iter()
                .filter(|a| matches!(a.shape, AnswerShape::FreeText | AnswerShape::AudioBearing))
                .filter(|a| !a.is_audio() || input.transcript(&a.question_id).is_some())
                .map(|a| depth_ratio(input.words_for(a), self.depth_target_words)),
        );

        let overall = match depth {
            Some(depth) => 0.6 * completion + 0.4 * depth,
            None => completion,
        };

        let mut dimensions = BTreeMap::new();
        dimensions.insert("completion".to_string(), round1(completion * 100.0));
        if let Some(depth) = depth {
            dimensions.insert("depth".to_string(), round1(depth * 100.0));
        }

        let mut notes = Vec::new();
        let missing = input.missing_transcripts();
        if missing > 0 {
            notes.push(format!("{} audio answer(s) scored without a transcript", missing));
        }

        ScoringResult {
            strategy: self.kind().to_string(),
            overall: round1(overall * 100.0),
            dimensions,
            mode: if missing > 0 {
                ScoringMode::Partial
            } else {
                ScoringMode::Full
            },
            answered,
            notes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AnswerMetadata, AnswerValue, NormalizedAnswer};

    fn text_answer(id: &str, text: &str) -> NormalizedAnswer {
        NormalizedAnswer {
            question_id: id.to_string(),
            shape: AnswerShape::FreeText,
            value: AnswerValue::Text(text.to_string()),
            metadata: AnswerMetadata {
                word_count: crate::models::count_words(text),
                char_count: text.len(),
                ..Default::default()
            },
            dimension: None,
        }
    }

    #[test]
    fn test_completion_and_depth() {
        let strategy = GeneralStrategy {
            depth_target_words: 4,
        };
        let answers = vec![
            text_answer("q1", "one two three four"),
            text_answer("q2", "one two"),
        ];

        let result = strategy.score(&ScoringInput::new(&answers), &RespondentContext::default());

        // completion 1.0, depth (1.0 + 0.5) / 2 = 0.75
        assert_eq!(result.dimensions["completion"], 100.0);
        assert_eq!(result.dimensions["depth"], 75.0);
        assert_eq!(result.overall, 90.0);
        assert_eq!(result.mode, ScoringMode::Full);
        assert_eq!(result.answered, 2);
    }

    #[test]
    fn test_empty_response_scores_zero() {
        let strategy = GeneralStrategy::default();
        let result = strategy.score(&ScoringInput::new(&[]), &RespondentContext::default());

        assert_eq!(result.overall, 0.0);
        assert_eq!(result.answered, 0);
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let strategy = GeneralStrategy::default();
        let answers = vec![text_answer("q1", "a thoughtful answer about teamwork")];
        let input = ScoringInput::new(&answers);

        let first = strategy.score(&input, &RespondentContext::default());
        let second = strategy.score(&input, &RespondentContext::default());

        assert_eq!(first, second);
    }
}
