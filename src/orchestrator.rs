use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::context::PipelineContext;
use crate::error::{PipelineError, SubmissionError};
use crate::events::{PipelineEvent, ResponseSubmitted, StageCompleted, StageOutcome};
use crate::jobs::JobScheduler;
use crate::models::{ProcessingStatus, ResponseRecord, Stage, Submission, WorkUnit};

/// What the orchestrator did with a signal
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Transitions persisted, then this unit handed to the scheduler
    Scheduled(WorkUnit),
    /// Transitions persisted; nothing further runs automatically
    Terminal(ProcessingStatus),
    /// Stale or duplicate signal; the record was not touched
    Ignored(String),
}

/// Translates completion signals into the next stage's work unit
///
/// Every transition is written to the store before any unit is scheduled.
/// Errors mark the record `listener_failed` and are returned to the caller,
/// whose retry policy decides on redelivery.
pub struct Orchestrator {
    ctx: PipelineContext,
    scheduler: Arc<dyn JobScheduler>,
    config: PipelineConfig,
}

impl Orchestrator {
    pub fn new(ctx: PipelineContext, scheduler: Arc<dyn JobScheduler>, config: PipelineConfig) -> Self {
        Self {
            ctx,
            scheduler,
            config,
        }
    }

    pub fn context(&self) -> &PipelineContext {
        &self.ctx
    }

    /// Validate, normalize and persist a submission as `pending`
    pub async fn accept(&self, submission: Submission) -> Result<ResponseSubmitted, SubmissionError> {
        let strategy = self.ctx.strategies.resolve(submission.questionnaire_type());

        let errors = strategy.validate(&submission.questionnaire, &submission.answers);
        if !errors.is_empty() {
            warn!(
                "Rejected {} submission for campaign {}: {} validation error(s)",
                strategy.kind(),
                submission.campaign_id,
                errors.len()
            );
            return Err(SubmissionError::Rejected(errors));
        }

        let normalized = strategy.normalize(&submission.questionnaire, &submission.answers);
        let record = ResponseRecord::new(
            submission.response_id.unwrap_or_else(Uuid::new_v4),
            submission.campaign_id,
            submission.questionnaire.questionnaire_id,
            &submission.questionnaire.questionnaire_type,
            submission.respondent,
            submission.answers,
            normalized,
            self.ctx.now(),
        );
        let record = self.ctx.store.insert(record).await?;

        info!(
            "Accepted response {} ({}, {} answers, audio={})",
            record.id,
            strategy.kind(),
            record.normalized_answers.len(),
            record.has_audio()
        );

        Ok(ResponseSubmitted {
            response_id: record.id,
            generation: record.generation,
            answers: record.normalized_answers,
            ai_required: strategy.requires_ai(),
        })
    }

    /// Consume one signal
    pub async fn handle(&self, event: &PipelineEvent) -> Result<Decision, PipelineError> {
        let result = match event {
            PipelineEvent::ResponseSubmitted(submitted) => self.on_submitted(submitted).await,
            PipelineEvent::StageCompleted(completed) => self.on_stage_completed(completed).await,
        };

        match result {
            Ok(decision) => {
                if let Decision::Ignored(reason) = &decision {
                    debug!("Ignored {}: {}", event, reason);
                }
                Ok(decision)
            }
            Err(err) => {
                error!("Orchestration failed for {}: {}", event, err);
                self.mark_listener_failed(event, &err).await;
                Err(err)
            }
        }
    }

    /// Route a freshly accepted (or reprocessed) response to its first stage
    pub async fn on_submitted(&self, event: &ResponseSubmitted) -> Result<Decision, PipelineError> {
        let mut record = self.ctx.store.get(event.response_id).await?;
        if let Some(reason) = stale_generation(&record, event.generation) {
            return Ok(Decision::Ignored(reason));
        }

        let status = record.effective_status();
        if !status.is_entry() {
            let downstream = status.phase() > ProcessingStatus::Processing.phase();
            return self.redeliver(record, downstream).await;
        }

        let now = self.ctx.now();
        let stage = if event.has_audio() {
            record.advance(ProcessingStatus::Transcribing, now)?;
            Stage::Transcription
        } else if event.ai_required {
            record.advance(ProcessingStatus::AnalyzingText, now)?;
            Stage::Interpretation
        } else {
            record.advance(ProcessingStatus::CalculatingScores, now)?;
            Stage::Scoring
        };

        let delay = self.config.delays.for_stage(stage);
        self.commit(record, Some((stage, delay))).await
    }

    /// Apply a stage's outcome and pick what runs next
    pub async fn on_stage_completed(&self, event: &StageCompleted) -> Result<Decision, PipelineError> {
        let mut record = self.ctx.store.get(event.response_id).await?;
        if let Some(reason) = stale_generation(&record, event.generation) {
            return Ok(Decision::Ignored(reason));
        }

        let status = record.effective_status();
        if !event.stage.accepts(status) {
            let downstream = status.phase() > last_phase_of(event.stage);
            return self.redeliver(record, downstream).await;
        }

        let now = self.ctx.now();
        let next = match (&event.outcome, event.stage) {
            (StageOutcome::Succeeded(_), Stage::Transcription) => {
                record.advance(ProcessingStatus::Transcribed, now)?;
                let strategy = self.ctx.strategies.resolve(&record.questionnaire_type);
                if strategy.requires_ai() {
                    record.advance(ProcessingStatus::AnalyzingText, now)?;
                    Some((Stage::Interpretation, self.config.delays.interpretation))
                } else {
                    record.advance(ProcessingStatus::CalculatingScores, now)?;
                    Some((Stage::Scoring, self.config.delays.scoring))
                }
            }
            (StageOutcome::Succeeded(_), Stage::Interpretation) => {
                if status == ProcessingStatus::AnalyzingText {
                    record.advance(ProcessingStatus::GeneratingAiInterpretation, now)?;
                }
                record.advance(ProcessingStatus::Analyzed, now)?;
                record.advance(ProcessingStatus::CalculatingScores, now)?;
                Some((Stage::Scoring, self.config.delays.scoring))
            }
            (StageOutcome::Succeeded(_), Stage::Scoring) => {
                record.advance(ProcessingStatus::Completed, now)?;
                self.report_unit()
            }
            (StageOutcome::Succeeded(_), Stage::Report) => {
                record.advance(ProcessingStatus::ReportCompleted, now)?;
                None
            }
            (StageOutcome::Failed { error, attempts }, Stage::Transcription) => {
                warn!(
                    "Transcription failed for {} after {} attempt(s): {}",
                    record.id, attempts, error
                );
                record.fail(ProcessingStatus::TranscriptionFailed, error, now)?;
                None
            }
            (StageOutcome::Failed { error, attempts }, Stage::Interpretation) => {
                warn!(
                    "AI interpretation failed for {} after {} attempt(s), scoring without it: {}",
                    record.id, attempts, error
                );
                record.fail(ProcessingStatus::AiAnalysisFailed, error, now)?;
                record.advance(ProcessingStatus::CalculatingScores, now)?;
                Some((Stage::Scoring, self.config.delays.fallback_scoring))
            }
            (StageOutcome::Failed { error, attempts }, Stage::Scoring) => {
                warn!(
                    "Scoring failed for {} after {} attempt(s): {}",
                    record.id, attempts, error
                );
                record.fail(ProcessingStatus::Failed, error, now)?;
                None
            }
            (StageOutcome::Failed { error, attempts }, Stage::Report) => {
                // Enrichment only: the response stays completed
                warn!(
                    "Report failed for {} after {} attempt(s): {}",
                    record.id, attempts, error
                );
                record.resume(now);
                record.record_error(error, now);
                None
            }
        };

        self.commit(record, next).await
    }

    /// Reset a response to `pending` and hand back the signal that re-enters it
    ///
    /// Work still in flight for the previous run carries the old generation and
    /// is ignored once it reports back.
    pub async fn reprocess(&self, response_id: Uuid) -> Result<ResponseSubmitted, PipelineError> {
        let mut record = self.ctx.store.get(response_id).await?;
        let previous = record.processing_status;

        let normalized = record.normalized_answers.clone();
        record.reset_for_reprocess(normalized, self.ctx.now());
        let record = self.ctx.store.put(record).await?;

        info!(
            "Reprocessing {} from {} (generation {})",
            record.id, previous, record.generation
        );

        let strategy = self.ctx.strategies.resolve(&record.questionnaire_type);
        Ok(ResponseSubmitted {
            response_id: record.id,
            generation: record.generation,
            answers: record.normalized_answers,
            ai_required: strategy.requires_ai(),
        })
    }

    /// Monitoring read: responses per status, optionally for one campaign
    pub async fn status_counts(
        &self,
        campaign_id: Option<Uuid>,
    ) -> Result<BTreeMap<ProcessingStatus, usize>, PipelineError> {
        Ok(self.ctx.store.status_counts(campaign_id).await?)
    }

    fn report_unit(&self) -> Option<(Stage, Duration)> {
        self.config
            .generate_reports
            .then_some((Stage::Report, self.config.delays.report))
    }

    /// Persist, then schedule
    async fn commit(
        &self,
        record: ResponseRecord,
        next: Option<(Stage, Duration)>,
    ) -> Result<Decision, PipelineError> {
        let record = self.ctx.store.put(record).await?;

        let Some((stage, delay)) = next else {
            info!("Response {} reached {}", record.id, record.processing_status);
            return Ok(Decision::Terminal(record.processing_status));
        };

        let unit = WorkUnit::new(stage, record.id, record.generation, delay);
        self.scheduler.schedule(unit.clone()).await?;
        info!(
            "Response {} now {}, scheduled {}",
            record.id, record.processing_status, unit
        );
        Ok(Decision::Scheduled(unit))
    }

    /// A signal whose stage no longer owns the record's status
    ///
    /// When a previous delivery persisted its transitions but failed to
    /// schedule, the record is parked in `listener_failed` at a later status:
    /// restore that status and issue the unit it is waiting on. Anything else
    /// is a duplicate.
    async fn redeliver(
        &self,
        mut record: ResponseRecord,
        downstream: bool,
    ) -> Result<Decision, PipelineError> {
        if record.processing_status != ProcessingStatus::ListenerFailed || !downstream {
            return Ok(Decision::Ignored(format!(
                "response is already {}",
                record.processing_status
            )));
        }

        let Some(status) = record.resume(self.ctx.now()) else {
            return Ok(Decision::Ignored("no resume point recorded".to_string()));
        };
        info!("Resuming {} at {}", record.id, status);

        let next = match Stage::for_status(status) {
            Some(Stage::Report) => self.report_unit(),
            Some(Stage::Scoring)
                if record.entered_from(status) == Some(ProcessingStatus::AiAnalysisFailed) =>
            {
                Some((Stage::Scoring, self.config.delays.fallback_scoring))
            }
            Some(stage) => Some((stage, self.config.delays.for_stage(stage))),
            None => None,
        };
        self.commit(record, next).await
    }

    /// Park the record so the failure is visible while the signal awaits redelivery
    async fn mark_listener_failed(&self, event: &PipelineEvent, err: &PipelineError) {
        let mut record = match self.ctx.store.get(event.response_id()).await {
            Ok(record) => record,
            Err(store_err) => {
                warn!(
                    "Could not mark {} listener_failed: {}",
                    event.response_id(),
                    store_err
                );
                return;
            }
        };

        if record.generation != event.generation() || !can_park(record.processing_status) {
            return;
        }

        record.mark_listener_failed(&err.to_string(), self.ctx.now());
        if let Err(store_err) = self.ctx.store.put(record).await {
            warn!(
                "Could not mark {} listener_failed: {}",
                event.response_id(),
                store_err
            );
        }
    }
}

fn stale_generation(record: &ResponseRecord, generation: u32) -> Option<String> {
    (record.generation != generation).then(|| {
        format!(
            "generation {} superseded by {}",
            generation, record.generation
        )
    })
}

/// Failure endpoints stay put; everything else, including `completed`, may be parked
fn can_park(status: ProcessingStatus) -> bool {
    !status.is_terminal()
        || matches!(
            status,
            ProcessingStatus::Completed | ProcessingStatus::ListenerFailed
        )
}

/// Furthest phase a stage's own statuses reach
fn last_phase_of(stage: Stage) -> u8 {
    match stage {
        Stage::Transcription => ProcessingStatus::Transcribing.phase(),
        Stage::Interpretation => ProcessingStatus::GeneratingAiInterpretation.phase(),
        Stage::Scoring => ProcessingStatus::CalculatingScores.phase(),
        Stage::Report => ProcessingStatus::Completed.phase(),
    }
}
