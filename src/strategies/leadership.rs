use std::collections::BTreeMap;

use crate::error::ValidationError;
use crate::models::{
    round1, AnswerShape, Questionnaire, RawAnswer, RespondentContext, ScoringInput, ScoringMode,
    ScoringResult,
};

use super::{depth_ratio, is_blank, mean, validate_common, ResponseStrategy, StrategyKind};

/// Competency-based leadership assessment, interpreted by AI
#[derive(Debug, Clone)]
pub struct LeadershipStrategy {
    pub depth_target_words: usize,
    /// Extra words expected from respondents with this much experience or more
    pub senior_threshold_years: u32,
    pub senior_extra_words: usize,
}

impl Default for LeadershipStrategy {
    fn default() -> Self {
        Self {
            depth_target_words: 80,
            senior_threshold_years: 5,
            senior_extra_words: 20,
        }
    }
}

impl LeadershipStrategy {
    fn depth_target(&self, respondent: &RespondentContext) -> usize {
        match respondent.experience_years {
            Some(years) if years >= self.senior_threshold_years => {
                self.depth_target_words + self.senior_extra_words
            }
            _ => self.depth_target_words,
        }
    }
}

impl ResponseStrategy for LeadershipStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Leadership
    }

    fn requires_ai(&self) -> bool {
        true
    }

    fn validate(&self, questionnaire: &Questionnaire, answers: &[RawAnswer]) -> Vec<ValidationError> {
        let mut errors = validate_common(questionnaire, answers);

        let has_open_answer = self
            .normalize(questionnaire, answers)
            .iter()
            .any(|a| matches!(a.shape, AnswerShape::FreeText | AnswerShape::AudioBearing) && !is_blank(&a.value));
        if !has_open_answer {
            errors.push(ValidationError::new(
                "answers",
                "at least one written or spoken answer is required",
            ));
        }

        errors
    }

    fn score(&self, input: &ScoringInput<'_>, respondent: &RespondentContext) -> ScoringResult {
        let target = self.depth_target(respondent);
        let open: Vec<_> = input
            .answers
            .iter()
            .filter(|a| matches!(a.shape, AnswerShape::FreeText | AnswerShape::AudioBearing))
            .collect();
        let answered = open.iter().filter(|a| input.words_for(a) > 0).count();
        let depth = mean(open.iter().map(|a| depth_ratio(input.words_for(a), target))).unwrap_or(0.0);

        let mut dimensions = BTreeMap::new();
        dimensions.insert("depth".to_string(), round1(depth * 100.0));

        let mut notes = Vec::new();
        let missing = input.missing_transcripts();
        if missing > 0 {
            notes.push(format!("{} audio answer(s) scored without a transcript", missing));
        }

        let competency = input
            .interpretation
            .and_then(|i| mean(i.competencies.values().map(|v| v.clamp(0.0, 1.0))));

        let (overall, mode) = match (input.interpretation, competency) {
            (Some(interpretation), Some(competency)) => {
                for (name, rating) in &interpretation.competencies {
                    dimensions.insert(name.clone(), round1(rating.clamp(0.0, 1.0) * 100.0));
                }
                let mode = if missing > 0 {
                    ScoringMode::Partial
                } else {
                    ScoringMode::Full
                };
                (0.7 * competency + 0.3 * depth, mode)
            }
            (Some(_), None) => {
                notes.push("interpretation carried no competency ratings; scored on depth only".to_string());
                (depth, ScoringMode::Partial)
            }
            (None, _) => {
                notes.push("AI interpretation unavailable; scored on depth only".to_string());
                (depth, ScoringMode::Partial)
            }
        };

        ScoringResult {
            strategy: self.kind().to_string(),
            overall: round1(overall * 100.0),
            dimensions,
            mode,
            answered,
            notes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        count_words, AnswerMetadata, AnswerValue, Interpretation, NormalizedAnswer, Question,
        QuestionKind,
    };
    use uuid::Uuid;

    fn text_answer(id: &str, words: usize) -> NormalizedAnswer {
        let text = vec!["word"; words].join(" ");
        NormalizedAnswer {
            question_id: id.to_string(),
            shape: AnswerShape::FreeText,
            metadata: AnswerMetadata {
                word_count: count_words(&text),
                char_count: text.len(),
                ..Default::default()
            },
            value: AnswerValue::Text(text),
            dimension: None,
        }
    }

    fn interpretation() -> Interpretation {
        let mut competencies = BTreeMap::new();
        competencies.insert("vision".to_string(), 0.8);
        competencies.insert("delegation".to_string(), 0.6);
        Interpretation {
            summary: "Clear communicator".to_string(),
            competencies,
            themes: vec![],
            confidence: 0.9,
            model: "test".to_string(),
        }
    }

    #[test]
    fn test_full_score_with_interpretation() {
        let answers = vec![text_answer("q1", 80)];
        let interpretation = interpretation();
        let input = ScoringInput::new(&answers).with_interpretation(Some(&interpretation));

        let result = LeadershipStrategy::default().score(&input, &RespondentContext::default());

        // 0.7 * 0.7 + 0.3 * 1.0
        assert_eq!(result.overall, 79.0);
        assert_eq!(result.mode, ScoringMode::Full);
        assert_eq!(result.dimensions["vision"], 80.0);
    }

    #[test]
    fn test_partial_score_without_interpretation() {
        let answers = vec![text_answer("q1", 40)];
        let result = LeadershipStrategy::default()
            .score(&ScoringInput::new(&answers), &RespondentContext::default());

        assert_eq!(result.overall, 50.0);
        assert_eq!(result.mode, ScoringMode::Partial);
        assert!(!result.notes.is_empty());
    }

    #[test]
    fn test_senior_respondents_need_more_depth() {
        let answers = vec![text_answer("q1", 80)];
        let senior = RespondentContext {
            experience_years: Some(12),
            ..Default::default()
        };

        let result = LeadershipStrategy::default().score(&ScoringInput::new(&answers), &senior);

        assert_eq!(result.dimensions["depth"], 80.0);
    }

    #[test]
    fn test_requires_an_open_answer() {
        let questionnaire = Questionnaire {
            questionnaire_id: Uuid::new_v4(),
            questionnaire_type: "leadership".to_string(),
            questions: vec![Question {
                question_id: "q1".to_string(),
                kind: QuestionKind::Scale,
                required: true,
                prompt: String::new(),
                options: vec![],
                correct_options: vec![],
                scale: None,
                dimension: None,
                reverse_scored: false,
                min_words: None,
            }],
        };
        let answers = vec![RawAnswer {
            question_id: "q1".to_string(),
            value: AnswerValue::Number(3.0),
        }];

        let errors = LeadershipStrategy::default().validate(&questionnaire, &answers);

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "answers");
    }
}
