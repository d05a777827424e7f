use std::collections::BTreeMap;

use reqwest::Url;

use crate::error::ValidationError;
use crate::models::{
    round1, AnswerShape, AnswerValue, Questionnaire, RawAnswer, RespondentContext, ScoringInput,
    ScoringMode, ScoringResult,
};

use super::{answer_field, depth_ratio, mean, validate_common, ResponseStrategy, StrategyKind};

/// Spoken interviews: delivery, depth and AI-rated competencies
#[derive(Debug, Clone)]
pub struct InterviewStrategy {
    pub depth_target_words: usize,
    /// Speaking rate band (words per minute) that earns full fluency
    pub ideal_wpm: (f64, f64),
    /// Rates at or beyond these earn no fluency
    pub floor_wpm: f64,
    pub ceiling_wpm: f64,
}

impl Default for InterviewStrategy {
    fn default() -> Self {
        Self {
            depth_target_words: 120,
            ideal_wpm: (110.0, 160.0),
            floor_wpm: 60.0,
            ceiling_wpm: 220.0,
        }
    }
}

impl InterviewStrategy {
    /// 1.0 inside the ideal band, falling linearly to 0 at the floor and ceiling
    pub fn fluency(&self, wpm: f64) -> f64 {
        let (low, high) = self.ideal_wpm;
        if wpm >= low && wpm <= high {
            1.0
        } else if wpm < low {
            ((wpm - self.floor_wpm) / (low - self.floor_wpm)).clamp(0.0, 1.0)
        } else {
            ((self.ceiling_wpm - wpm) / (self.ceiling_wpm - high)).clamp(0.0, 1.0)
        }
    }
}

impl ResponseStrategy for InterviewStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Interview
    }

    fn requires_ai(&self) -> bool {
        true
    }

    fn validate(&self, questionnaire: &Questionnaire, answers: &[RawAnswer]) -> Vec<ValidationError> {
        let mut errors = validate_common(questionnaire, answers);

        for answer in answers {
            if let AnswerValue::Audio { audio_url, .. } = &answer.value {
                let url = audio_url.trim();
                if !url.is_empty() && Url::parse(url).is_err() {
                    errors.push(ValidationError::new(
                        answer_field(&answer.question_id),
                        "audio_url is not a valid URL",
                    ));
                }
            }
        }

        errors
    }

    fn score(&self, input: &ScoringInput<'_>, respondent: &RespondentContext) -> ScoringResult {
        let open: Vec<_> = input
            .answers
            .iter()
            .filter(|a| matches!(a.shape, AnswerShape::FreeText | AnswerShape::AudioBearing))
            .collect();
        let answered = open.iter().filter(|a| input.words_for(a) > 0).count();
        let depth = mean(
            open.iter()
                .map(|a| depth_ratio(input.words_for(a), self.depth_target_words)),
        )
        .unwrap_or(0.0);

        let transcripts: Vec<_> = input
            .answers
            .iter()
            .filter(|a| a.is_audio())
            .filter_map(|a| input.transcript(&a.question_id))
            .collect();
        let fluency = mean(transcripts.iter().map(|t| self.fluency(t.words_per_minute())));

        let competency = input
            .interpretation
            .and_then(|i| mean(i.competencies.values().map(|v| v.clamp(0.0, 1.0))));

        let mut notes = Vec::new();
        let missing = input.missing_transcripts();
        if missing > 0 {
            notes.push(format!("{} audio answer(s) scored without a transcript", missing));
        }
        if competency.is_none() {
            notes.push("AI interpretation unavailable; scored on delivery and depth".to_string());
        }
        if let Some(expected) = respondent.language.as_deref() {
            let mismatched = transcripts
                .iter()
                .filter_map(|t| t.language.as_deref())
                .filter(|lang| !same_language(lang, expected))
                .count();
            if mismatched > 0 {
                notes.push(format!(
                    "{} transcript(s) detected in a language other than {}",
                    mismatched, expected
                ));
            }
        }

        // Weighted blend over whichever components are available
        let components = match competency {
            Some(competency) => vec![(0.5, Some(competency)), (0.25, fluency), (0.25, Some(depth))],
            None => vec![(0.5, fluency), (0.5, Some(depth))],
        };
        let (weighted, weight) = components
            .iter()
            .filter_map(|(w, v)| v.map(|v| (w * v, *w)))
            .fold((0.0, 0.0), |(sum, total), (wv, w)| (sum + wv, total + w));
        let overall = if weight > 0.0 { weighted / weight } else { 0.0 };

        let mut dimensions = BTreeMap::new();
        dimensions.insert("depth".to_string(), round1(depth * 100.0));
        if let Some(fluency) = fluency {
            dimensions.insert("fluency".to_string(), round1(fluency * 100.0));
        }
        if let (Some(interpretation), Some(_)) = (input.interpretation, competency) {
            for (name, rating) in &interpretation.competencies {
                dimensions.insert(name.clone(), round1(rating.clamp(0.0, 1.0) * 100.0));
            }
        }

        let mode = if competency.is_some() && missing == 0 {
            ScoringMode::Full
        } else {
            ScoringMode::Partial
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

/// Compare primary language subtags, so "en-US" matches "en"
fn same_language(a: &str, b: &str) -> bool {
    let primary = |tag: &str| tag.split(['-', '_']).next().unwrap_or("").to_ascii_lowercase();
    primary(a) == primary(b)
}
