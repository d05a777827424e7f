use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    ComprehensiveReport, Interpretation, NormalizedAnswer, ProcessingStatus, RawAnswer,
    RespondentContext, ScoringInput, ScoringResult, TranscriptMap,
};
use crate::error::InvalidTransition;

/// One entry of the record's audit trail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusTransition {
    pub from: ProcessingStatus,
    pub to: ProcessingStatus,
    pub at: DateTime<Utc>,
}

/// Per-phase timestamps. Informational only; never read for control flow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageTimestamps {
    pub submitted_at: Option<DateTime<Utc>>,
    pub transcription_started_at: Option<DateTime<Utc>>,
    pub transcription_completed_at: Option<DateTime<Utc>>,
    pub analysis_started_at: Option<DateTime<Utc>>,
    pub analysis_completed_at: Option<DateTime<Utc>>,
    pub scoring_started_at: Option<DateTime<Utc>>,
    pub scoring_completed_at: Option<DateTime<Utc>>,
    pub report_completed_at: Option<DateTime<Utc>>,
    pub reprocessed_at: Option<DateTime<Utc>>,
}

impl StageTimestamps {
    fn stamp(&mut self, status: ProcessingStatus, now: DateTime<Utc>) {
        let slot = match status {
            ProcessingStatus::Transcribing => &mut self.transcription_started_at,
            ProcessingStatus::Transcribed | ProcessingStatus::TranscriptionFailed => {
                &mut self.transcription_completed_at
            }
            ProcessingStatus::AnalyzingText => &mut self.analysis_started_at,
            ProcessingStatus::Analyzed | ProcessingStatus::AiAnalysisFailed => {
                &mut self.analysis_completed_at
            }
            ProcessingStatus::CalculatingScores => &mut self.scoring_started_at,
            ProcessingStatus::Completed => &mut self.scoring_completed_at,
            ProcessingStatus::ReportCompleted => &mut self.report_completed_at,
            _ => return,
        };
        *slot = Some(now);
    }

    /// Seconds from submission to scoring completion, if both are known
    pub fn turnaround_seconds(&self) -> Option<i64> {
        match (self.submitted_at, self.scoring_completed_at) {
            (Some(start), Some(end)) => Some((end - start).num_seconds()),
            _ => None,
        }
    }
}

/// The persistent entity tracking one submission through the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub questionnaire_id: Uuid,
    /// Type classifier the strategy is resolved from
    pub questionnaire_type: String,
    #[serde(default)]
    pub respondent: RespondentContext,
    pub processing_status: ProcessingStatus,
    /// Status held before the orchestrator parked the record in `listener_failed`
    #[serde(default)]
    pub resume_status: Option<ProcessingStatus>,
    /// Incremented on every reprocess; stale work from older runs is ignored
    #[serde(default)]
    pub generation: u32,
    /// Optimistic concurrency version, bumped by the store on every write
    #[serde(default)]
    pub version: u64,
    /// As submitted; never modified
    pub raw_answers: Vec<RawAnswer>,
    pub normalized_answers: Vec<NormalizedAnswer>,
    #[serde(default)]
    pub transcriptions: Option<TranscriptMap>,
    #[serde(default)]
    pub ai_analysis: Option<Interpretation>,
    #[serde(default)]
    pub scores: Option<ScoringResult>,
    #[serde(default)]
    pub report: Option<ComprehensiveReport>,
    #[serde(default)]
    pub timestamps: StageTimestamps,
    #[serde(default)]
    pub last_error: Option<String>,
    #[serde(default)]
    pub failed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub transitions: Vec<StatusTransition>,
}

impl ResponseRecord {
    /// Create a record in the initial `pending` status
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: Uuid,
        campaign_id: Uuid,
        questionnaire_id: Uuid,
        questionnaire_type: &str,
        respondent: RespondentContext,
        raw_answers: Vec<RawAnswer>,
        normalized_answers: Vec<NormalizedAnswer>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            campaign_id,
            questionnaire_id,
            questionnaire_type: questionnaire_type.to_string(),
            respondent,
            processing_status: ProcessingStatus::Pending,
            resume_status: None,
            generation: 0,
            version: 0,
            raw_answers,
            normalized_answers,
            transcriptions: None,
            ai_analysis: None,
            scores: None,
            report: None,
            timestamps: StageTimestamps {
                submitted_at: Some(now),
                ..Default::default()
            },
            last_error: None,
            failed_at: None,
            transitions: Vec::new(),
        }
    }

    /// Status the pipeline acts on: the resume point while parked in `listener_failed`
    pub fn effective_status(&self) -> ProcessingStatus {
        match (self.processing_status, self.resume_status) {
            (ProcessingStatus::ListenerFailed, Some(resume)) => resume,
            (status, _) => status,
        }
    }

    pub fn has_audio(&self) -> bool {
        self.normalized_answers.iter().any(|a| a.is_audio())
    }

    /// Move along the pipeline graph, stamping the phase timestamp
    pub fn advance(
        &mut self,
        next: ProcessingStatus,
        now: DateTime<Utc>,
    ) -> Result<(), InvalidTransition> {
        let from = self.effective_status();
        if !from.can_transition_to(next) {
            return Err(InvalidTransition { from, to: next });
        }

        self.set_status(next, now);
        self.resume_status = None;
        self.timestamps.stamp(next, now);
        Ok(())
    }

    /// Advance into a failure status and record the error
    pub fn fail(
        &mut self,
        next: ProcessingStatus,
        error: &str,
        now: DateTime<Utc>,
    ) -> Result<(), InvalidTransition> {
        self.advance(next, now)?;
        self.record_error(error, now);
        Ok(())
    }

    /// Overwrite the error fields without changing status
    pub fn record_error(&mut self, error: &str, now: DateTime<Utc>) {
        self.last_error = Some(error.to_string());
        self.failed_at = Some(now);
    }

    /// Park in `listener_failed`, remembering where to resume from
    pub fn mark_listener_failed(&mut self, error: &str, now: DateTime<Utc>) {
        if self.processing_status != ProcessingStatus::ListenerFailed {
            self.resume_status = Some(self.processing_status);
            self.set_status(ProcessingStatus::ListenerFailed, now);
        }
        self.record_error(error, now);
    }

    /// Leave `listener_failed` for the remembered status, without re-applying anything
    pub fn resume(&mut self, now: DateTime<Utc>) -> Option<ProcessingStatus> {
        if self.processing_status != ProcessingStatus::ListenerFailed {
            return None;
        }
        let resume = self.resume_status.take()?;
        self.set_status(resume, now);
        Some(resume)
    }

    /// The only permitted rewind: back to `pending` with all derived artifacts cleared
    pub fn reset_for_reprocess(
        &mut self,
        normalized_answers: Vec<NormalizedAnswer>,
        now: DateTime<Utc>,
    ) {
        self.set_status(ProcessingStatus::Pending, now);
        self.resume_status = None;
        self.generation += 1;
        self.normalized_answers = normalized_answers;
        self.transcriptions = None;
        self.ai_analysis = None;
        self.scores = None;
        self.report = None;
        self.last_error = None;
        self.failed_at = None;
        self.timestamps = StageTimestamps {
            submitted_at: self.timestamps.submitted_at,
            reprocessed_at: Some(now),
            ..Default::default()
        };
    }

    /// Statuses visited since the last reset, starting from `pending`
    pub fn path_since_reset(&self) -> Vec<ProcessingStatus> {
        let start = self
            .transitions
            .iter()
            .rposition(|t| t.to == ProcessingStatus::Pending)
            .map(|i| i + 1)
            .unwrap_or(0);

        let mut path = vec![ProcessingStatus::Pending];
        path.extend(self.transitions[start..].iter().map(|t| t.to));
        path
    }

    /// Status the record last came from when entering `status`, ignoring resumes from `listener_failed`
    pub fn entered_from(&self, status: ProcessingStatus) -> Option<ProcessingStatus> {
        self.transitions
            .iter()
            .rev()
            .find(|t| t.to == status && t.from != ProcessingStatus::ListenerFailed)
            .map(|t| t.from)
    }

    /// Scoring inputs assembled from whatever stages have produced
    pub fn scoring_input(&self) -> ScoringInput<'_> {
        ScoringInput::new(&self.normalized_answers)
            .with_transcripts(self.transcriptions.as_ref())
            .with_interpretation(self.ai_analysis.as_ref())
    }

    fn set_status(&mut self, next: ProcessingStatus, now: DateTime<Utc>) {
        self.transitions.push(StatusTransition {
            from: self.processing_status,
            to: next,
            at: now,
        });
        self.processing_status = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> ResponseRecord {
        ResponseRecord::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            "general",
            RespondentContext::default(),
            vec![],
            vec![],
            Utc::now(),
        )
    }

    #[test]
    fn test_new_record_is_pending() {
        let record = record();
        assert_eq!(record.processing_status, ProcessingStatus::Pending);
        assert!(record.timestamps.submitted_at.is_some());
        assert!(record.transitions.is_empty());
    }

    #[test]
    fn test_advance_rejects_skipping_ahead() {
        let mut record = record();
        record.advance(ProcessingStatus::Transcribing, Utc::now()).unwrap();

        let err = record
            .advance(ProcessingStatus::CalculatingScores, Utc::now())
            .unwrap_err();

        assert_eq!(err.from, ProcessingStatus::Transcribing);
        assert_eq!(err.to, ProcessingStatus::CalculatingScores);
        assert_eq!(record.processing_status, ProcessingStatus::Transcribing);
    }

    #[test]
    fn test_advance_stamps_timestamps() {
        let mut record = record();
        let now = Utc::now();
        record.advance(ProcessingStatus::Transcribing, now).unwrap();
        record.advance(ProcessingStatus::Transcribed, now).unwrap();

        assert_eq!(record.timestamps.transcription_started_at, Some(now));
        assert_eq!(record.timestamps.transcription_completed_at, Some(now));
        assert_eq!(record.timestamps.scoring_started_at, None);
    }

    #[test]
    fn test_fail_overwrites_error() {
        let mut record = record();
        record.record_error("first", Utc::now());
        record.advance(ProcessingStatus::Transcribing, Utc::now()).unwrap();
        record
            .fail(ProcessingStatus::TranscriptionFailed, "second", Utc::now())
            .unwrap();

        assert_eq!(record.last_error.as_deref(), Some("second"));
        assert!(record.failed_at.is_some());
    }

    #[test]
    fn test_listener_failure_resumes_from_prior_status() {
        let mut record = record();
        record.advance(ProcessingStatus::Transcribing, Utc::now()).unwrap();
        record.mark_listener_failed("store unavailable", Utc::now());

        assert_eq!(record.processing_status, ProcessingStatus::ListenerFailed);
        assert_eq!(record.effective_status(), ProcessingStatus::Transcribing);

        // Marking twice keeps the original resume point
        record.mark_listener_failed("still unavailable", Utc::now());
        assert_eq!(record.resume_status, Some(ProcessingStatus::Transcribing));

        record.advance(ProcessingStatus::Transcribed, Utc::now()).unwrap();
        assert_eq!(record.processing_status, ProcessingStatus::Transcribed);
        assert_eq!(record.resume_status, None);
    }

    #[test]
    fn test_reset_for_reprocess_clears_artifacts() {
        let mut record = record();
        record.advance(ProcessingStatus::CalculatingScores, Utc::now()).unwrap();
        record
            .fail(ProcessingStatus::Failed, "scoring blew up", Utc::now())
            .unwrap();

        record.reset_for_reprocess(vec![], Utc::now());

        assert_eq!(record.processing_status, ProcessingStatus::Pending);
        assert_eq!(record.generation, 1);
        assert_eq!(record.last_error, None);
        assert_eq!(record.failed_at, None);
        assert!(record.timestamps.reprocessed_at.is_some());
        assert!(record.timestamps.submitted_at.is_some());
        assert_eq!(record.path_since_reset(), vec![ProcessingStatus::Pending]);
    }

    #[test]
    fn test_path_since_reset() {
        let mut record = record();
        record.advance(ProcessingStatus::CalculatingScores, Utc::now()).unwrap();
        record.advance(ProcessingStatus::Completed, Utc::now()).unwrap();

        assert_eq!(
            record.path_since_reset(),
            vec![
                ProcessingStatus::Pending,
                ProcessingStatus::CalculatingScores,
                ProcessingStatus::Completed
            ]
        );
    }
}
