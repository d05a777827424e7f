use serde::{Deserialize, Serialize};

use super::TranscriptArtifact;

/// Root response from Deepgram's pre-recorded `listen` endpoint
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeepgramResponse {
    #[serde(default)]
    pub metadata: Option<DeepgramMetadata>,
    pub results: DeepgramResults,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeepgramMetadata {
    /// Audio duration in seconds
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub request_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeepgramResults {
    pub channels: Vec<DeepgramChannel>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeepgramChannel {
    pub alternatives: Vec<DeepgramAlternative>,
    /// Present when `detect_language=true`
    #[serde(default)]
    pub detected_language: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeepgramAlternative {
    #[serde(default)]
    pub transcript: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub words: Vec<DeepgramWord>,
}

/// A single recognized word
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeepgramWord {
    pub word: String,
    /// Start timestamp in seconds
    pub start: f64,
    /// End timestamp in seconds
    pub end: f64,
    /// Transcription accuracy score (0-1)
    pub confidence: f64,
    #[serde(default)]
    pub punctuated_word: Option<String>,
}

impl DeepgramResponse {
    fn first_channel(&self) -> Option<&DeepgramChannel> {
        self.results.channels.first()
    }

    fn first_alternative(&self) -> Option<&DeepgramAlternative> {
        self.first_channel().and_then(|c| c.alternatives.first())
    }

    /// Extract all words from the first channel's first alternative
    pub fn words(&self) -> &[DeepgramWord] {
        self.first_alternative()
            .map(|a| a.words.as_slice())
            .unwrap_or(&[])
    }

    /// Audio duration, falling back to the last word's end time
    pub fn duration_seconds(&self) -> f64 {
        self.metadata
            .as_ref()
            .map(|m| m.duration)
            .filter(|d| *d > 0.0)
            .or_else(|| self.words().last().map(|w| w.end))
            .unwrap_or(0.0)
    }

    /// Flatten into the pipeline's transcript artifact
    pub fn to_artifact(&self) -> TranscriptArtifact {
        let alternative = self.first_alternative();
        let text = alternative
            .map(|a| a.transcript.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| {
                self.words()
                    .iter()
                    .map(|w| w.punctuated_word.as_deref().unwrap_or(&w.word))
                    .collect::<Vec<_>>()
                    .join(" ")
            });

        TranscriptArtifact {
            text,
            duration_seconds: self.duration_seconds(),
            language: self.first_channel().and_then(|c| c.detected_language.clone()),
            confidence: alternative.map(|a| a.confidence).unwrap_or(0.0),
        }
    }
}
