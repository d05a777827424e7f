use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{NormalizedAnswer, ScoringMode, Stage, TranscriptMap};

/// Signals consumed by the orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    ResponseSubmitted(ResponseSubmitted),
    StageCompleted(StageCompleted),
}

impl PipelineEvent {
    pub fn response_id(&self) -> Uuid {
        match self {
            PipelineEvent::ResponseSubmitted(e) => e.response_id,
            PipelineEvent::StageCompleted(e) => e.response_id,
        }
    }

    pub fn generation(&self) -> u32 {
        match self {
            PipelineEvent::ResponseSubmitted(e) => e.generation,
            PipelineEvent::StageCompleted(e) => e.generation,
        }
    }
}

impl fmt::Display for PipelineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineEvent::ResponseSubmitted(e) => {
                write!(f, "response_submitted({})", e.response_id)
            }
            PipelineEvent::StageCompleted(e) => write!(
                f,
                "{}_{}({})",
                e.stage,
                if e.outcome.is_success() { "succeeded" } else { "failed" },
                e.response_id
            ),
        }
    }
}

/// Inbound trigger: a response was accepted and persisted as `pending`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseSubmitted {
    pub response_id: Uuid,
    pub generation: u32,
    pub answers: Vec<NormalizedAnswer>,
    pub ai_required: bool,
}

impl ResponseSubmitted {
    pub fn has_audio(&self) -> bool {
        self.answers.iter().any(|a| a.is_audio())
    }
}

/// Outbound signal from a worker once a stage has run, or run out of attempts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageCompleted {
    pub response_id: Uuid,
    pub stage: Stage,
    /// Generation of the work unit that produced this signal
    pub generation: u32,
    pub outcome: StageOutcome,
}

impl StageCompleted {
    pub fn succeeded(response_id: Uuid, generation: u32, summary: StageSummary) -> Self {
        Self {
            response_id,
            stage: summary.stage(),
            generation,
            outcome: StageOutcome::Succeeded(summary),
        }
    }

    pub fn failed(
        response_id: Uuid,
        stage: Stage,
        generation: u32,
        error: impl Into<String>,
        attempts: u32,
    ) -> Self {
        Self {
            response_id,
            stage,
            generation,
            outcome: StageOutcome::Failed {
                error: error.into(),
                attempts,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StageOutcome {
    Succeeded(StageSummary),
    Failed { error: String, attempts: u32 },
}

impl StageOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, StageOutcome::Succeeded(_))
    }
}

/// Stage-specific result payload. Stable per stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum StageSummary {
    /// Answer id to transcript text, duration and detected language
    Transcription { transcripts: TranscriptMap },
    Interpretation {
        confidence: f64,
        model: String,
        competencies: usize,
    },
    Scoring {
        strategy: String,
        overall: f64,
        mode: ScoringMode,
    },
    Report { sections: usize },
}

impl StageSummary {
    pub fn stage(&self) -> Stage {
        match self {
            StageSummary::Transcription { .. } => Stage::Transcription,
            StageSummary::Interpretation { .. } => Stage::Interpretation,
            StageSummary::Scoring { .. } => Stage::Scoring,
            StageSummary::Report { .. } => Stage::Report,
        }
    }
}
