use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of input a question asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    /// Open-ended written answer
    FreeText,
    /// Recorded spoken answer
    Audio,
    /// One or more options from a fixed list
    MultiSelect,
    /// Likert-style rating within a bounded scale
    Scale,
    /// Free numeric value
    Numeric,
}

/// Inclusive rating bounds for scale questions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleRange {
    pub min: f64,
    pub max: f64,
}

impl Default for ScaleRange {
    fn default() -> Self {
        Self { min: 1.0, max: 5.0 }
    }
}

impl ScaleRange {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Map a value onto 0-1 within the range
    pub fn fraction(&self, value: f64) -> f64 {
        let span = self.max - self.min;
        if span <= 0.0 {
            return 0.0;
        }
        ((value - self.min) / span).clamp(0.0, 1.0)
    }
}

/// A single question of a questionnaire
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub question_id: String,
    pub kind: QuestionKind,
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(default)]
    pub prompt: String,
    /// Allowed options for multi-select questions
    #[serde(default)]
    pub options: Vec<String>,
    /// Answer key for graded multi-select questions
    #[serde(default)]
    pub correct_options: Vec<String>,
    #[serde(default)]
    pub scale: Option<ScaleRange>,
    /// Trait, competency or skill this question feeds into
    #[serde(default)]
    pub dimension: Option<String>,
    /// Scale answers are flipped before scoring
    #[serde(default)]
    pub reverse_scored: bool,
    /// Minimum word count for written answers
    #[serde(default)]
    pub min_words: Option<usize>,
}

fn default_required() -> bool {
    true
}

/// Questionnaire definition the answers are checked against
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Questionnaire {
    pub questionnaire_id: Uuid,
    /// Type classifier used to resolve the scoring strategy
    pub questionnaire_type: String,
    pub questions: Vec<Question>,
}

impl Questionnaire {
    pub fn question(&self, question_id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.question_id == question_id)
    }
}

/// Submitted value for one question, as received
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    /// Reference to a recorded audio blob
    Audio {
        audio_url: String,
        #[serde(default)]
        duration_seconds: Option<f64>,
    },
    Number(f64),
    Choices(Vec<String>),
    Text(String),
}

/// One raw submitted answer. Never modified after the record is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawAnswer {
    pub question_id: String,
    pub value: AnswerValue,
}

/// Shape an answer was classified into during normalization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerShape {
    AudioBearing,
    MultiSelect,
    FreeText,
    Numeric,
}

/// Per-answer figures used later by scoring
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnswerMetadata {
    pub word_count: usize,
    pub char_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_duration_seconds: Option<f64>,
    pub selected_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numeric_value: Option<f64>,
    /// Bounds of the rating scale, for scale answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<ScaleRange>,
    /// Share of the answer key matched (0-1), for graded answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
}

/// An answer after strategy normalization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedAnswer {
    pub question_id: String,
    pub shape: AnswerShape,
    pub value: AnswerValue,
    pub metadata: AnswerMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension: Option<String>,
}

impl NormalizedAnswer {
    /// Audio-bearing with a recording to transcribe; a blank reference does not count
    pub fn is_audio(&self) -> bool {
        self.shape == AnswerShape::AudioBearing && self.audio_url().is_some()
    }

    pub fn audio_url(&self) -> Option<&str> {
        match &self.value {
            AnswerValue::Audio { audio_url, .. } if !audio_url.trim().is_empty() => Some(audio_url),
            _ => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.value {
            AnswerValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn choices(&self) -> &[String] {
        match &self.value {
            AnswerValue::Choices(choices) => choices,
            _ => &[],
        }
    }
}

/// Count whitespace-separated words
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}
