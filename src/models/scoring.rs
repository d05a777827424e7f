use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{count_words, AnswerShape, NormalizedAnswer};

/// Who answered, as far as scoring cares
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RespondentContext {
    #[serde(default)]
    pub respondent_id: Option<String>,
    /// Role the respondent is assessed for
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub experience_years: Option<u32>,
    /// Preferred language hint (BCP-47)
    #[serde(default)]
    pub language: Option<String>,
}

/// Transcript of one audio answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptArtifact {
    pub text: String,
    pub duration_seconds: f64,
    #[serde(default)]
    pub language: Option<String>,
    /// Provider confidence (0-1)
    pub confidence: f64,
}

impl TranscriptArtifact {
    pub fn word_count(&self) -> usize {
        count_words(&self.text)
    }

    /// Speaking rate; zero when the duration is unknown
    pub fn words_per_minute(&self) -> f64 {
        if self.duration_seconds <= 0.0 {
            return 0.0;
        }
        self.word_count() as f64 / (self.duration_seconds / 60.0)
    }
}

/// Transcripts keyed by question id
pub type TranscriptMap = BTreeMap<String, TranscriptArtifact>;

/// Structured output of the AI-interpretation provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interpretation {
    pub summary: String,
    /// Competency ratings (0-1) keyed by dimension
    #[serde(default)]
    pub competencies: BTreeMap<String, f64>,
    #[serde(default)]
    pub themes: Vec<String>,
    /// Provider confidence (0-1)
    pub confidence: f64,
    #[serde(default)]
    pub model: String,
}

/// Whether scoring saw every input it is designed for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringMode {
    Full,
    /// Interpretation or some transcripts were unavailable
    Partial,
}

/// Everything a strategy may score from. Only `answers` is guaranteed.
#[derive(Debug, Clone, Copy)]
pub struct ScoringInput<'a> {
    pub answers: &'a [NormalizedAnswer],
    pub transcripts: Option<&'a TranscriptMap>,
    pub interpretation: Option<&'a Interpretation>,
}

impl<'a> ScoringInput<'a> {
    pub fn new(answers: &'a [NormalizedAnswer]) -> Self {
        Self {
            answers,
            transcripts: None,
            interpretation: None,
        }
    }

    pub fn with_transcripts(mut self, transcripts: Option<&'a TranscriptMap>) -> Self {
        self.transcripts = transcripts;
        self
    }

    pub fn with_interpretation(mut self, interpretation: Option<&'a Interpretation>) -> Self {
        self.interpretation = interpretation;
        self
    }

    pub fn transcript(&self, question_id: &str) -> Option<&'a TranscriptArtifact> {
        self.transcripts.and_then(|t| t.get(question_id))
    }

    /// Written text of an answer, or its transcript for audio answers
    pub fn text_for(&self, answer: &'a NormalizedAnswer) -> Option<&'a str> {
        match answer.shape {
            AnswerShape::AudioBearing => self
                .transcript(&answer.question_id)
                .map(|t| t.text.as_str()),
            _ => answer.text(),
        }
    }

    /// Word count of an answer, counting transcribed words for audio answers
    pub fn words_for(&self, answer: &NormalizedAnswer) -> usize {
        match answer.shape {
            AnswerShape::AudioBearing => self
                .transcript(&answer.question_id)
                .map(|t| t.word_count())
                .unwrap_or(0),
            _ => answer.metadata.word_count,
        }
    }

    /// Audio answers that have no transcript
    pub fn missing_transcripts(&self) -> usize {
        self.answers
            .iter()
            .filter(|a| a.is_audio() && self.transcript(&a.question_id).is_none())
            .count()
    }
}

/// Result of a strategy's score computation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringResult {
    /// Strategy tag that produced the scores
    pub strategy: String,
    /// Overall score (0-100)
    pub overall: f64,
    /// Per-dimension scores (0-100)
    #[serde(default)]
    pub dimensions: BTreeMap<String, f64>,
    pub mode: ScoringMode,
    pub answered: usize,
    #[serde(default)]
    pub notes: Vec<String>,
}

/// One section of the comprehensive report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSection {
    pub title: String,
    pub body: String,
}

/// Structured output of the report synthesizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComprehensiveReport {
    pub headline: String,
    pub sections: Vec<ReportSection>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

/// Round to one decimal place
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AnswerMetadata, AnswerValue};

    fn audio_answer(id: &str) -> NormalizedAnswer {
        NormalizedAnswer {
            question_id: id.to_string(),
            shape: AnswerShape::AudioBearing,
            value: AnswerValue::Audio {
                audio_url: format!("mem://{}", id),
                duration_seconds: None,
            },
            metadata: AnswerMetadata::default(),
            dimension: None,
        }
    }

    #[test]
    fn test_words_per_minute() {
        let transcript = TranscriptArtifact {
            text: "one two three four five six".to_string(),
            duration_seconds: 3.0,
            language: None,
            confidence: 0.9,
        };
        assert_eq!(transcript.words_per_minute(), 120.0);

        let unknown = TranscriptArtifact {
            duration_seconds: 0.0,
            ..transcript
        };
        assert_eq!(unknown.words_per_minute(), 0.0);
    }

    #[test]
    fn test_missing_transcripts() {
        let answers = vec![audio_answer("q1"), audio_answer("q2")];
        let mut transcripts = TranscriptMap::new();
        transcripts.insert(
            "q1".to_string(),
            TranscriptArtifact {
                text: "hello there".to_string(),
                duration_seconds: 2.0,
                language: Some("en".to_string()),
                confidence: 0.8,
            },
        );

        let input = ScoringInput::new(&answers).with_transcripts(Some(&transcripts));

        assert_eq!(input.missing_transcripts(), 1);
        assert_eq!(input.words_for(&answers[0]), 2);
        assert_eq!(input.text_for(&answers[0]), Some("hello there"));
        assert_eq!(input.text_for(&answers[1]), None);
    }

    #[test]
    fn test_round1() {
        assert_eq!(round1(66.666), 66.7);
        assert_eq!(round1(0.04), 0.0);
    }
}
