use std::collections::{BTreeMap, HashSet};

use crate::models::{
    round1, AnswerShape, NormalizedAnswer, Questionnaire, RawAnswer, RespondentContext,
    ScoringInput, ScoringMode, ScoringResult,
};

use super::{classify_answers, mean, ResponseStrategy, StrategyKind};

const SELF_ASSESSMENT: &str = "self_assessment";
const DEFAULT_SKILL: &str = "general";

/// Graded skills tests: accuracy per skill against an answer key
#[derive(Debug, Clone, Copy, Default)]
pub struct SkillsStrategy;

impl ResponseStrategy for SkillsStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Skills
    }

    fn requires_ai(&self) -> bool {
        false
    }

    fn normalize(&self, questionnaire: &Questionnaire, answers: &[RawAnswer]) -> Vec<NormalizedAnswer> {
        let mut normalized = classify_answers(questionnaire, answers);

        for answer in normalized
            .iter_mut()
            .filter(|a| a.shape == AnswerShape::MultiSelect)
        {
            let Some(question) = questionnaire.question(&answer.question_id) else {
                continue;
            };
            if question.correct_options.is_empty() {
                continue;
            }
            answer.metadata.accuracy = Some(accuracy(answer.choices(), &question.correct_options));
        }

        normalized
    }

    fn score(&self, input: &ScoringInput<'_>, _respondent: &RespondentContext) -> ScoringResult {
        let mut graded: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        let mut self_rated = Vec::new();

        for answer in input.answers {
            if let Some(accuracy) = answer.metadata.accuracy {
                let skill = answer
                    .dimension
                    .clone()
                    .unwrap_or_else(|| DEFAULT_SKILL.to_string());
                graded.entry(skill).or_default().push(accuracy);
            } else if let (Some(value), Some(scale)) =
                (answer.metadata.numeric_value, answer.metadata.scale)
            {
                self_rated.push(scale.fraction(value));
            }
        }

        let answered = graded.values().map(Vec::len).sum::<usize>() + self_rated.len();
        let mut dimensions: BTreeMap<String, f64> = graded
            .into_iter()
            .filter_map(|(skill, values)| mean(values).map(|m| (skill, round1(m * 100.0))))
            .collect();

        // Only graded skills count towards the overall score
        let overall = mean(dimensions.values().copied()).unwrap_or(0.0);

        let mut notes = Vec::new();
        if dimensions.is_empty() {
            notes.push("no graded answers; overall score reflects nothing".to_string());
        }
        if let Some(self_assessment) = mean(self_rated) {
            dimensions.insert(SELF_ASSESSMENT.to_string(), round1(self_assessment * 100.0));
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

/// Share of the key hit, minus wrong picks, floored at zero
fn accuracy(selected: &[String], correct: &[String]) -> f64 {
    let key: HashSet<&str> = correct.iter().map(String::as_str).collect();
    let picked: HashSet<&str> = selected.iter().map(String::as_str).collect();

    let hits = picked.intersection(&key).count() as f64;
    let misses = picked.difference(&key).count() as f64;

    ((hits - misses) / key.len() as f64).clamp(0.0, 1.0)
}
