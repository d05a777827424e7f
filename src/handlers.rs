use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::context::PipelineContext;
use crate::error::StageError;
use crate::events::StageSummary;
use crate::jobs::{HandlerOutcome, StageHandler};
use crate::models::{AnswerShape, ProcessingStatus, ResponseRecord, Stage, WorkUnit};
use crate::providers::{
    CorpusEntry, InterpretationRequest, Interpreter, ReportRequest, ReportSynthesizer, TextSource,
    Transcriber,
};
use crate::strategies::is_blank;

/// Load the unit's record, or explain why the unit no longer applies
async fn load_eligible(
    ctx: &PipelineContext,
    unit: &WorkUnit,
) -> Result<Result<ResponseRecord, String>, StageError> {
    let record = ctx.store.get(unit.response_id).await?;

    if record.generation != unit.generation {
        return Ok(Err(format!(
            "generation {} superseded by {}",
            unit.generation, record.generation
        )));
    }

    let status = record.effective_status();
    if !unit.stage.accepts(status) {
        return Ok(Err(format!("{} is not eligible for {}", status, unit.stage)));
    }

    Ok(Ok(record))
}

/// Transcribes every audio answer and sets the transcript map
pub struct TranscriptionHandler {
    transcriber: Arc<dyn Transcriber>,
}

impl TranscriptionHandler {
    pub fn new(transcriber: Arc<dyn Transcriber>) -> Self {
        Self { transcriber }
    }
}

#[async_trait]
impl StageHandler for TranscriptionHandler {
    fn stage(&self) -> Stage {
        Stage::Transcription
    }

    async fn handle(&self, ctx: &PipelineContext, unit: &WorkUnit) -> Result<HandlerOutcome, StageError> {
        let mut record = match load_eligible(ctx, unit).await? {
            Ok(record) => record,
            Err(reason) => return Ok(HandlerOutcome::Skipped(reason)),
        };

        let mut transcripts = record.transcriptions.clone().unwrap_or_default();
        let outstanding: Vec<(String, String)> = record
            .normalized_answers
            .iter()
            .filter(|a| !transcripts.contains_key(&a.question_id))
            .filter_map(|a| Some((a.question_id.clone(), a.audio_url()?.to_string())))
            .collect();
        let language = record.respondent.language.clone();

        // Each transcript is stored as soon as it exists, so a retry only redoes the rest
        for (question_id, audio_url) in outstanding {
            debug!("Transcribing {} for {}", question_id, record.id);
            let artifact = self
                .transcriber
                .transcribe(&audio_url, language.as_deref())
                .await?;
            transcripts.insert(question_id, artifact);
            record.transcriptions = Some(transcripts.clone());
            record = ctx.store.put(record).await?;
        }

        info!(
            "Transcribed {} audio answer(s) for {}",
            transcripts.len(),
            record.id
        );

        Ok(HandlerOutcome::Completed(StageSummary::Transcription { transcripts }))
    }
}

/// Builds the text corpus and stores the AI interpretation
pub struct InterpretationHandler {
    interpreter: Arc<dyn Interpreter>,
}

impl InterpretationHandler {
    pub fn new(interpreter: Arc<dyn Interpreter>) -> Self {
        Self { interpreter }
    }
}

/// Written answers as-is, audio answers through their transcript
pub fn build_corpus(record: &ResponseRecord) -> Vec<CorpusEntry> {
    let input = record.scoring_input();
    record
        .normalized_answers
        .iter()
        .filter_map(|answer| {
            let source = match answer.shape {
                AnswerShape::FreeText if !is_blank(&answer.value) => TextSource::Written,
                AnswerShape::AudioBearing => TextSource::Transcript,
                _ => return None,
            };
            let text = input.text_for(answer)?.trim();
            (!text.is_empty()).then(|| CorpusEntry {
                question_id: answer.question_id.clone(),
                source,
                text: text.to_string(),
            })
        })
        .collect()
}

#[async_trait]
impl StageHandler for InterpretationHandler {
    fn stage(&self) -> Stage {
        Stage::Interpretation
    }

    async fn handle(&self, ctx: &PipelineContext, unit: &WorkUnit) -> Result<HandlerOutcome, StageError> {
        let mut record = match load_eligible(ctx, unit).await? {
            Ok(record) => record,
            Err(reason) => return Ok(HandlerOutcome::Skipped(reason)),
        };

        let corpus = build_corpus(&record);
        if corpus.is_empty() {
            return Err(StageError::Fatal("no text to interpret".to_string()));
        }

        if record.effective_status() == ProcessingStatus::AnalyzingText {
            record.advance(ProcessingStatus::GeneratingAiInterpretation, ctx.now())?;
            record = ctx.store.put(record).await?;
        }

        let request = InterpretationRequest {
            questionnaire_type: record.questionnaire_type.clone(),
            respondent: record.respondent.clone(),
            corpus,
        };
        debug!(
            "Interpreting {} answer(s) ({} words) for {}",
            request.corpus.len(),
            request.word_count(),
            record.id
        );
        let interpretation = self.interpreter.interpret(&request).await?;

        let summary = StageSummary::Interpretation {
            confidence: interpretation.confidence,
            model: interpretation.model.clone(),
            competencies: interpretation.competencies.len(),
        };
        record.ai_analysis = Some(interpretation);
        ctx.store.put(record).await?;

        Ok(HandlerOutcome::Completed(summary))
    }
}

/// Runs the resolved strategy's scoring over whatever artifacts exist
pub struct ScoringHandler;

#[async_trait]
impl StageHandler for ScoringHandler {
    fn stage(&self) -> Stage {
        Stage::Scoring
    }

    async fn handle(&self, ctx: &PipelineContext, unit: &WorkUnit) -> Result<HandlerOutcome, StageError> {
        let mut record = match load_eligible(ctx, unit).await? {
            Ok(record) => record,
            Err(reason) => return Ok(HandlerOutcome::Skipped(reason)),
        };

        let strategy = ctx.strategies.resolve(&record.questionnaire_type);
        let result = strategy.score(&record.scoring_input(), &record.respondent);

        if !result.overall.is_finite() || result.dimensions.values().any(|v| !v.is_finite()) {
            return Err(StageError::Fatal(format!(
                "{} strategy produced a non-finite score",
                strategy.kind()
            )));
        }

        info!(
            "Scored {} with {}: {} ({:?})",
            record.id,
            strategy.kind(),
            result.overall,
            result.mode
        );
        let summary = StageSummary::Scoring {
            strategy: result.strategy.clone(),
            overall: result.overall,
            mode: result.mode,
        };
        record.scores = Some(result);
        ctx.store.put(record).await?;

        Ok(HandlerOutcome::Completed(summary))
    }
}

/// Synthesizes the comprehensive report from scores and interpretation
pub struct ReportHandler {
    synthesizer: Arc<dyn ReportSynthesizer>,
}

impl ReportHandler {
    pub fn new(synthesizer: Arc<dyn ReportSynthesizer>) -> Self {
        Self { synthesizer }
    }
}

#[async_trait]
impl StageHandler for ReportHandler {
    fn stage(&self) -> Stage {
        Stage::Report
    }

    async fn handle(&self, ctx: &PipelineContext, unit: &WorkUnit) -> Result<HandlerOutcome, StageError> {
        let mut record = match load_eligible(ctx, unit).await? {
            Ok(record) => record,
            Err(reason) => return Ok(HandlerOutcome::Skipped(reason)),
        };

        let Some(scores) = record.scores.clone() else {
            return Err(StageError::Fatal("no scores to report on".to_string()));
        };

        let request = ReportRequest {
            questionnaire_type: record.questionnaire_type.clone(),
            respondent: record.respondent.clone(),
            scores,
            interpretation: record.ai_analysis.clone(),
        };
        let report = self.synthesizer.synthesize(&request).await?;

        let summary = StageSummary::Report {
            sections: report.sections.len(),
        };
        record.report = Some(report);
        ctx.store.put(record).await?;

        Ok(HandlerOutcome::Completed(summary))
    }
}
