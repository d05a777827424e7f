use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ProcessingStatus;

/// One discrete unit of pipeline work
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Transcription,
    Interpretation,
    Scoring,
    Report,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::Transcription,
        Stage::Interpretation,
        Stage::Scoring,
        Stage::Report,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Transcription => "transcription",
            Stage::Interpretation => "interpretation",
            Stage::Scoring => "scoring",
            Stage::Report => "report",
        }
    }

    /// Queue family this stage runs on
    pub fn queue(&self) -> QueueName {
        match self {
            Stage::Transcription => QueueName::AudioProcessing,
            Stage::Interpretation => QueueName::AiProcessing,
            Stage::Scoring => QueueName::Scoring,
            Stage::Report => QueueName::Reporting,
        }
    }

    /// Statuses in which this stage's handler is allowed to run
    pub fn accepts(&self, status: ProcessingStatus) -> bool {
        match self {
            Stage::Transcription => status == ProcessingStatus::Transcribing,
            Stage::Interpretation => matches!(
                status,
                ProcessingStatus::AnalyzingText | ProcessingStatus::GeneratingAiInterpretation
            ),
            Stage::Scoring => status == ProcessingStatus::CalculatingScores,
            Stage::Report => status == ProcessingStatus::Completed,
        }
    }

    /// Stage whose work unit is outstanding while a record sits in `status`
    pub fn for_status(status: ProcessingStatus) -> Option<Stage> {
        Stage::ALL.into_iter().find(|stage| stage.accepts(status))
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical queue, one per stage family
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueueName {
    AudioProcessing,
    AiProcessing,
    Scoring,
    Reporting,
}

impl QueueName {
    pub const ALL: [QueueName; 4] = [
        QueueName::AudioProcessing,
        QueueName::AiProcessing,
        QueueName::Scoring,
        QueueName::Reporting,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QueueName::AudioProcessing => "audio-processing",
            QueueName::AiProcessing => "ai-processing",
            QueueName::Scoring => "scoring",
            QueueName::Reporting => "reporting",
        }
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transient scheduling request handed to the job scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkUnit {
    pub stage: Stage,
    pub response_id: Uuid,
    pub queue: QueueName,
    /// Minimum wait before the unit may run
    pub delay: Duration,
    /// Record generation the unit was issued under
    pub generation: u32,
}

impl WorkUnit {
    pub fn new(stage: Stage, response_id: Uuid, generation: u32, delay: Duration) -> Self {
        Self {
            stage,
            response_id,
            queue: stage.queue(),
            delay,
            generation,
        }
    }
}

impl fmt::Display for WorkUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}#{} for {} on {} after {:?}",
            self.stage, self.generation, self.response_id, self.queue, self.delay
        )
    }
}
