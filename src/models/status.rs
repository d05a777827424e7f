use std::fmt;

use serde::{Deserialize, Serialize};

/// Pipeline position of a response. Closed set; the record never holds anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    /// Accepted, nothing scheduled yet
    Pending,
    /// Picked up by the intake layer, nothing scheduled yet
    Processing,
    /// Audio answers are being transcribed
    Transcribing,
    /// All audio answers have transcripts
    Transcribed,
    /// Text corpus is being assembled for interpretation
    AnalyzingText,
    /// Waiting on the AI-interpretation provider
    GeneratingAiInterpretation,
    /// AI interpretation stored
    Analyzed,
    /// Scores are being computed
    CalculatingScores,
    /// Scores stored; the response is done
    Completed,
    /// Comprehensive report stored
    ReportCompleted,
    /// Transcription exhausted its attempts or was rejected
    TranscriptionFailed,
    /// AI interpretation exhausted its attempts or was rejected
    AiAnalysisFailed,
    /// The orchestrator failed while handling a completion signal
    ListenerFailed,
    /// Generic failure (scoring, or anything without a dedicated variant)
    Failed,
}

impl ProcessingStatus {
    pub const ALL: [ProcessingStatus; 14] = [
        ProcessingStatus::Pending,
        ProcessingStatus::Processing,
        ProcessingStatus::Transcribing,
        ProcessingStatus::Transcribed,
        ProcessingStatus::AnalyzingText,
        ProcessingStatus::GeneratingAiInterpretation,
        ProcessingStatus::Analyzed,
        ProcessingStatus::CalculatingScores,
        ProcessingStatus::Completed,
        ProcessingStatus::ReportCompleted,
        ProcessingStatus::TranscriptionFailed,
        ProcessingStatus::AiAnalysisFailed,
        ProcessingStatus::ListenerFailed,
        ProcessingStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Pending => "pending",
            ProcessingStatus::Processing => "processing",
            ProcessingStatus::Transcribing => "transcribing",
            ProcessingStatus::Transcribed => "transcribed",
            ProcessingStatus::AnalyzingText => "analyzing_text",
            ProcessingStatus::GeneratingAiInterpretation => "generating_ai_interpretation",
            ProcessingStatus::Analyzed => "analyzed",
            ProcessingStatus::CalculatingScores => "calculating_scores",
            ProcessingStatus::Completed => "completed",
            ProcessingStatus::ReportCompleted => "report_completed",
            ProcessingStatus::TranscriptionFailed => "transcription_failed",
            ProcessingStatus::AiAnalysisFailed => "ai_analysis_failed",
            ProcessingStatus::ListenerFailed => "listener_failed",
            ProcessingStatus::Failed => "failed",
        }
    }

    /// Position along the pipeline graph. Failure variants sit at the phase
    /// where they occur so that the degraded path still moves forward.
    pub fn phase(&self) -> u8 {
        match self {
            ProcessingStatus::Pending => 0,
            ProcessingStatus::Processing => 1,
            ProcessingStatus::Transcribing => 2,
            ProcessingStatus::Transcribed | ProcessingStatus::TranscriptionFailed => 3,
            ProcessingStatus::AnalyzingText => 4,
            ProcessingStatus::GeneratingAiInterpretation => 5,
            ProcessingStatus::Analyzed | ProcessingStatus::AiAnalysisFailed => 6,
            ProcessingStatus::CalculatingScores => 7,
            ProcessingStatus::Completed => 8,
            ProcessingStatus::ReportCompleted => 9,
            ProcessingStatus::ListenerFailed | ProcessingStatus::Failed => 10,
        }
    }

    /// Whether a response in this status may be picked up as a fresh submission
    pub fn is_entry(&self) -> bool {
        matches!(self, ProcessingStatus::Pending | ProcessingStatus::Processing)
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            ProcessingStatus::TranscriptionFailed
                | ProcessingStatus::AiAnalysisFailed
                | ProcessingStatus::ListenerFailed
                | ProcessingStatus::Failed
        )
    }

    /// No further automatic transitions happen from a terminal status.
    ///
    /// `ai_analysis_failed` is not terminal: the orchestrator always moves it on
    /// to scoring. `completed` is terminal even though a report may still follow.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProcessingStatus::Completed
                | ProcessingStatus::ReportCompleted
                | ProcessingStatus::TranscriptionFailed
                | ProcessingStatus::ListenerFailed
                | ProcessingStatus::Failed
        )
    }

    /// Forward edges of the pipeline graph. Reprocessing is not an edge; it is
    /// a reset handled by the record itself.
    pub fn can_transition_to(&self, next: ProcessingStatus) -> bool {
        use ProcessingStatus::*;

        // Any non-terminal status may fall into the orchestration or generic failure state
        if matches!(next, ListenerFailed | Failed) {
            return !self.is_terminal() || (*self == Completed && next == ListenerFailed);
        }

        match (self, next) {
            (Pending, Processing) => true,
            (Pending | Processing, Transcribing | AnalyzingText | CalculatingScores) => true,
            (Transcribing, Transcribed | TranscriptionFailed) => true,
            (Transcribed, AnalyzingText | CalculatingScores) => true,
            (AnalyzingText, GeneratingAiInterpretation | AiAnalysisFailed) => true,
            (GeneratingAiInterpretation, Analyzed | AiAnalysisFailed) => true,
            (Analyzed | AiAnalysisFailed, CalculatingScores) => true,
            (CalculatingScores, Completed) => true,
            (Completed, ReportCompleted) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_uses_snake_case() {
        let json = serde_json::to_string(&ProcessingStatus::GeneratingAiInterpretation).unwrap();
        assert_eq!(json, "\"generating_ai_interpretation\"");

        let parsed: ProcessingStatus = serde_json::from_str("\"transcription_failed\"").unwrap();
        assert_eq!(parsed, ProcessingStatus::TranscriptionFailed);
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let parsed: Result<ProcessingStatus, _> = serde_json::from_str("\"half_done\"");
        assert!(parsed.is_err());
    }

    #[test]
    fn test_as_str_matches_serde() {
        for status in ProcessingStatus::ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
    }

    #[test]
    fn test_every_edge_moves_forward() {
        for from in ProcessingStatus::ALL {
            for to in ProcessingStatus::ALL {
                if from.can_transition_to(to) {
                    assert!(
                        to.phase() > from.phase(),
                        "{} -> {} regresses",
                        from,
                        to
                    );
                }
            }
        }
    }

    #[test]
    fn test_terminal_states_have_no_regular_exits() {
        for to in ProcessingStatus::ALL {
            assert!(!ProcessingStatus::TranscriptionFailed.can_transition_to(to));
            assert!(!ProcessingStatus::Failed.can_transition_to(to));
            assert!(!ProcessingStatus::ReportCompleted.can_transition_to(to));
        }
    }

    #[test]
    fn test_scoring_not_reachable_while_transcribing() {
        assert!(!ProcessingStatus::Transcribing.can_transition_to(ProcessingStatus::CalculatingScores));
        assert!(!ProcessingStatus::Transcribing.can_transition_to(ProcessingStatus::Completed));
    }

    #[test]
    fn test_ai_failure_continues_to_scoring() {
        assert!(!ProcessingStatus::AiAnalysisFailed.is_terminal());
        assert!(ProcessingStatus::AiAnalysisFailed.can_transition_to(ProcessingStatus::CalculatingScores));
    }
}
