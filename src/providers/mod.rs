pub mod anthropic;
pub mod deepgram;
pub mod prompts;

pub use anthropic::*;
pub use deepgram::*;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::ProviderError;
use crate::models::{
    ComprehensiveReport, Interpretation, RespondentContext, ScoringResult, TranscriptArtifact,
};

/// Audio blob reference in, transcript text with duration and language out
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(
        &self,
        audio_url: &str,
        language_hint: Option<&str>,
    ) -> Result<TranscriptArtifact, ProviderError>;
}

/// Text corpus plus prompt context in, structured interpretation out
#[async_trait]
pub trait Interpreter: Send + Sync {
    async fn interpret(&self, request: &InterpretationRequest) -> Result<Interpretation, ProviderError>;
}

/// Scores and interpretation in, report sections out
#[async_trait]
pub trait ReportSynthesizer: Send + Sync {
    async fn synthesize(&self, request: &ReportRequest) -> Result<ComprehensiveReport, ProviderError>;
}

/// Where a corpus entry's text came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextSource {
    Written,
    Transcript,
}

/// One answer's text as handed to the interpreter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorpusEntry {
    pub question_id: String,
    pub source: TextSource,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterpretationRequest {
    pub questionnaire_type: String,
    pub respondent: RespondentContext,
    pub corpus: Vec<CorpusEntry>,
}

impl InterpretationRequest {
    pub fn word_count(&self) -> usize {
        self.corpus
            .iter()
            .map(|e| crate::models::count_words(&e.text))
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportRequest {
    pub questionnaire_type: String,
    pub respondent: RespondentContext,
    pub scores: ScoringResult,
    pub interpretation: Option<Interpretation>,
}
