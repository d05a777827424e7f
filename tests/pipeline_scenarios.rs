use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Semaphore;
use uuid::Uuid;

use responseflow::models::{
    ComprehensiveReport, Interpretation, ReportSection, ScoringMode, TranscriptArtifact,
};
use responseflow::providers::{InterpretationRequest, ReportRequest};
use responseflow::{
    InMemoryStore, InterpretationHandler, Interpreter, Pipeline, PipelineConfig, PipelineContext,
    ProcessingStatus, ProviderError, ReportHandler, ReportSynthesizer, ResponseRecord,
    ResponseStore, ScoringHandler, StageHandler, StoreError, Submission, SubmissionError,
    Transcriber, TranscriptionHandler,
};

const SETTLE: Duration = Duration::from_secs(5);

struct FakeTranscriber {
    calls: AtomicU32,
    failure: Option<ProviderError>,
    gate: Option<Semaphore>,
}

impl FakeTranscriber {
    fn working() -> Self {
        Self {
            calls: AtomicU32::new(0),
            failure: None,
            gate: None,
        }
    }

    fn failing(failure: ProviderError) -> Self {
        Self {
            failure: Some(failure),
            ..Self::working()
        }
    }

    /// Blocks every call until permits are added to the gate
    fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::working()
        }
    }
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(
        &self,
        audio_url: &str,
        _language_hint: Option<&str>,
    ) -> Result<TranscriptArtifact, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await;
        }
        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }
        Ok(TranscriptArtifact {
            text: format!("I walked the team through {} step by step", audio_url),
            duration_seconds: 30.0,
            language: Some("en".to_string()),
            confidence: 0.93,
        })
    }
}

struct FakeInterpreter {
    calls: AtomicU32,
    fail: bool,
}

impl FakeInterpreter {
    fn new(fail: bool) -> Self {
        Self {
            calls: AtomicU32::new(0),
            fail,
        }
    }
}

#[async_trait]
impl Interpreter for FakeInterpreter {
    async fn interpret(&self, request: &InterpretationRequest) -> Result<Interpretation, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ProviderError::Transient("upstream timeout".to_string()));
        }
        Ok(Interpretation {
            summary: format!("{} answer(s) reviewed", request.corpus.len()),
            competencies: BTreeMap::from([
                ("communication".to_string(), 0.8),
                ("ownership".to_string(), 0.6),
            ]),
            themes: vec!["mentoring".to_string()],
            confidence: 0.75,
            model: "fake-model".to_string(),
        })
    }
}

struct FakeSynthesizer;

#[async_trait]
impl ReportSynthesizer for FakeSynthesizer {
    async fn synthesize(&self, request: &ReportRequest) -> Result<ComprehensiveReport, ProviderError> {
        Ok(ComprehensiveReport {
            headline: format!("Overall {}", request.scores.overall),
            sections: vec![ReportSection {
                title: "Strengths".to_string(),
                body: "Clear and specific answers".to_string(),
            }],
            recommendations: vec![],
        })
    }
}

/// Scoring handler that fails fatally while the switch is on
struct SwitchableScoring {
    failing: AtomicBool,
}

#[async_trait]
impl StageHandler for SwitchableScoring {
    fn stage(&self) -> responseflow::Stage {
        responseflow::Stage::Scoring
    }

    async fn handle(
        &self,
        ctx: &PipelineContext,
        unit: &responseflow::WorkUnit,
    ) -> Result<responseflow::HandlerOutcome, responseflow::StageError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(responseflow::StageError::Fatal("scoring backend unavailable".to_string()));
        }
        ScoringHandler.handle(ctx, unit).await
    }
}

/// Store whose first `put` fails
struct FlakyStore {
    inner: InMemoryStore,
    fail_next_put: AtomicBool,
}

#[async_trait]
impl ResponseStore for FlakyStore {
    async fn insert(&self, record: ResponseRecord) -> Result<ResponseRecord, StoreError> {
        self.inner.insert(record).await
    }

    async fn get(&self, id: Uuid) -> Result<ResponseRecord, StoreError> {
        self.inner.get(id).await
    }

    async fn put(&self, record: ResponseRecord) -> Result<ResponseRecord, StoreError> {
        if self.fail_next_put.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Backend("connection reset".to_string()));
        }
        self.inner.put(record).await
    }

    async fn list(&self, campaign_id: Option<Uuid>) -> Result<Vec<ResponseRecord>, StoreError> {
        self.inner.list(campaign_id).await
    }
}

fn no_reports() -> PipelineConfig {
    PipelineConfig {
        generate_reports: false,
        ..PipelineConfig::immediate()
    }
}

fn start(
    store: Arc<dyn ResponseStore>,
    config: PipelineConfig,
    transcriber: Arc<FakeTranscriber>,
    interpreter: Arc<FakeInterpreter>,
) -> Pipeline {
    let handlers: Vec<Arc<dyn StageHandler>> = vec![
        Arc::new(TranscriptionHandler::new(transcriber)),
        Arc::new(InterpretationHandler::new(interpreter)),
        Arc::new(ScoringHandler),
        Arc::new(ReportHandler::new(Arc::new(FakeSynthesizer))),
    ];
    Pipeline::start(PipelineContext::new(store), config, handlers)
}

fn text_submission(questionnaire_type: &str) -> Submission {
    serde_json::from_value(json!({
        "campaign_id": Uuid::new_v4(),
        "questionnaire": {
            "questionnaire_id": Uuid::new_v4(),
            "questionnaire_type": questionnaire_type,
            "questions": [
                {"question_id": "situation", "kind": "free_text"},
                {"question_id": "outcome", "kind": "free_text"}
            ]
        },
        "respondent": {"role": "team lead", "experience_years": 3},
        "answers": [
            {"question_id": "situation", "value": "Our release slipped twice so I split the work into smaller milestones"},
            {"question_id": "outcome", "value": "We shipped on the third date and kept weekly demos afterwards"}
        ]
    }))
    .unwrap()
}

fn audio_submission(questionnaire_type: &str) -> Submission {
    serde_json::from_value(json!({
        "campaign_id": Uuid::new_v4(),
        "questionnaire": {
            "questionnaire_id": Uuid::new_v4(),
            "questionnaire_type": questionnaire_type,
            "questions": [
                {"question_id": "intro", "kind": "audio"}
            ]
        },
        "answers": [
            {"question_id": "intro", "value": {"audio_url": "https://media.example.com/intro.webm", "duration_seconds": 30.0}}
        ]
    }))
    .unwrap()
}

async fn run_one(pipeline: &Pipeline, submission: Submission) -> ResponseRecord {
    let id = pipeline.submit(submission).await.unwrap();
    assert!(pipeline.wait_for_settled(SETTLE).await, "pipeline did not settle");
    pipeline.record(id).await.unwrap()
}

#[tokio::test]
async fn test_text_only_ai_type_runs_interpretation() {
    let interpreter = Arc::new(FakeInterpreter::new(false));
    let pipeline = start(
        Arc::new(InMemoryStore::new()),
        no_reports(),
        Arc::new(FakeTranscriber::working()),
        interpreter.clone(),
    );

    let record = run_one(&pipeline, text_submission("leadership")).await;

    use ProcessingStatus::*;
    assert_eq!(
        record.path_since_reset(),
        vec![Pending, AnalyzingText, GeneratingAiInterpretation, Analyzed, CalculatingScores, Completed]
    );
    assert_eq!(interpreter.calls.load(Ordering::SeqCst), 1);
    assert_eq!(record.ai_analysis.unwrap().model, "fake-model");
    let scores = record.scores.unwrap();
    assert_eq!(scores.mode, ScoringMode::Full);
    assert!(scores.dimensions.contains_key("communication"));

    pipeline.shutdown().await;
}

#[tokio::test]
async fn test_audio_without_ai_skips_interpretation() {
    let transcriber = Arc::new(FakeTranscriber::working());
    let interpreter = Arc::new(FakeInterpreter::new(false));
    let pipeline = start(
        Arc::new(InMemoryStore::new()),
        no_reports(),
        transcriber.clone(),
        interpreter.clone(),
    );

    let record = run_one(&pipeline, audio_submission("general")).await;

    use ProcessingStatus::*;
    assert_eq!(
        record.path_since_reset(),
        vec![Pending, Transcribing, Transcribed, CalculatingScores, Completed]
    );
    assert_eq!(transcriber.calls.load(Ordering::SeqCst), 1);
    assert_eq!(interpreter.calls.load(Ordering::SeqCst), 0);
    assert_eq!(record.transcriptions.unwrap().len(), 1);
    assert!(record.scores.is_some());

    pipeline.shutdown().await;
}

#[tokio::test]
async fn test_transcription_failure_is_terminal() {
    let transcriber = Arc::new(FakeTranscriber::failing(ProviderError::Transient(
        "503 from provider".to_string(),
    )));
    let pipeline = start(
        Arc::new(InMemoryStore::new()),
        no_reports(),
        transcriber.clone(),
        Arc::new(FakeInterpreter::new(false)),
    );

    let record = run_one(&pipeline, audio_submission("interview")).await;

    assert_eq!(record.processing_status, ProcessingStatus::TranscriptionFailed);
    assert!(record.last_error.unwrap().contains("503 from provider"));
    assert!(record.failed_at.is_some());
    assert!(record.scores.is_none());
    assert_eq!(transcriber.calls.load(Ordering::SeqCst), 3);

    pipeline.shutdown().await;
}

#[tokio::test]
async fn test_reprocess_failed_response_starts_over() {
    let store = Arc::new(InMemoryStore::new());
    let scoring = Arc::new(SwitchableScoring {
        failing: AtomicBool::new(true),
    });
    let handlers: Vec<Arc<dyn StageHandler>> = vec![scoring.clone()];
    let pipeline = Pipeline::start(PipelineContext::new(store), no_reports(), handlers);

    let failed = run_one(&pipeline, text_submission("general")).await;
    assert_eq!(failed.processing_status, ProcessingStatus::Failed);
    assert!(failed.last_error.is_some());

    scoring.failing.store(false, Ordering::SeqCst);
    pipeline.reprocess(failed.id).await.unwrap();
    assert!(pipeline.wait_for_settled(SETTLE).await);

    let record = pipeline.record(failed.id).await.unwrap();
    use ProcessingStatus::*;
    assert_eq!(record.generation, 1);
    assert_eq!(record.path_since_reset(), vec![Pending, CalculatingScores, Completed]);
    assert_eq!(record.last_error, None);
    assert_eq!(record.failed_at, None);
    assert!(record.timestamps.reprocessed_at.is_some());
    assert!(record.transitions.iter().any(|t| t.to == Failed));

    pipeline.shutdown().await;
}

#[tokio::test]
async fn test_ai_failure_still_scores() {
    let interpreter = Arc::new(FakeInterpreter::new(true));
    let pipeline = start(
        Arc::new(InMemoryStore::new()),
        no_reports(),
        Arc::new(FakeTranscriber::working()),
        interpreter.clone(),
    );

    let record = run_one(&pipeline, audio_submission("interview")).await;

    use ProcessingStatus::*;
    assert_eq!(
        record.path_since_reset(),
        vec![
            Pending,
            Transcribing,
            Transcribed,
            AnalyzingText,
            GeneratingAiInterpretation,
            AiAnalysisFailed,
            CalculatingScores,
            Completed
        ]
    );
    assert_eq!(interpreter.calls.load(Ordering::SeqCst), 3);
    assert!(record.ai_analysis.is_none());
    assert!(record.last_error.unwrap().contains("upstream timeout"));
    assert_eq!(record.scores.unwrap().mode, ScoringMode::Partial);

    pipeline.shutdown().await;
}

#[tokio::test]
async fn test_report_completes_after_scoring() {
    let pipeline = start(
        Arc::new(InMemoryStore::new()),
        PipelineConfig::immediate(),
        Arc::new(FakeTranscriber::working()),
        Arc::new(FakeInterpreter::new(false)),
    );

    let record = run_one(&pipeline, text_submission("leadership")).await;

    assert_eq!(record.processing_status, ProcessingStatus::ReportCompleted);
    let report = record.report.unwrap();
    assert_eq!(report.sections.len(), 1);
    assert!(record.timestamps.report_completed_at.is_some());

    pipeline.shutdown().await;
}

#[tokio::test]
async fn test_store_failure_parks_then_resumes() {
    let store = Arc::new(FlakyStore {
        inner: InMemoryStore::new(),
        fail_next_put: AtomicBool::new(true),
    });
    let pipeline = start(
        store,
        no_reports(),
        Arc::new(FakeTranscriber::working()),
        Arc::new(FakeInterpreter::new(false)),
    );

    let record = run_one(&pipeline, text_submission("general")).await;

    use ProcessingStatus::*;
    assert_eq!(
        record.path_since_reset(),
        vec![Pending, ListenerFailed, CalculatingScores, Completed]
    );
    assert_eq!(record.resume_status, None);
    assert!(record.scores.is_some());

    pipeline.shutdown().await;
}

#[tokio::test]
async fn test_reprocess_during_transcription_discards_old_run() {
    let transcriber = Arc::new(FakeTranscriber::gated());
    let pipeline = start(
        Arc::new(InMemoryStore::new()),
        no_reports(),
        transcriber.clone(),
        Arc::new(FakeInterpreter::new(false)),
    );

    let id = pipeline.submit(audio_submission("general")).await.unwrap();
    tokio::time::timeout(SETTLE, async {
        while transcriber.calls.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    pipeline.reprocess(id).await.unwrap();
    if let Some(gate) = &transcriber.gate {
        gate.add_permits(16);
    }
    assert!(pipeline.wait_for_settled(SETTLE).await);

    let record = pipeline.record(id).await.unwrap();
    use ProcessingStatus::*;
    assert_eq!(record.generation, 1);
    assert_eq!(
        record.path_since_reset(),
        vec![Pending, Transcribing, Transcribed, CalculatingScores, Completed]
    );
    assert_eq!(record.transcriptions.unwrap().len(), 1);

    pipeline.shutdown().await;
}

#[tokio::test]
async fn test_rejected_submission_creates_no_record() {
    let store = Arc::new(InMemoryStore::new());
    let pipeline = start(
        store.clone(),
        no_reports(),
        Arc::new(FakeTranscriber::working()),
        Arc::new(FakeInterpreter::new(false)),
    );

    let mut submission = text_submission("general");
    submission.answers.clear();

    let err = pipeline.submit(submission).await.unwrap_err();

    assert!(matches!(err, SubmissionError::Rejected(errors) if errors.len() == 2));
    assert!(store.list(None).await.unwrap().is_empty());

    pipeline.shutdown().await;
}

#[tokio::test]
async fn test_status_counts_across_responses() {
    let pipeline = start(
        Arc::new(InMemoryStore::new()),
        no_reports(),
        Arc::new(FakeTranscriber::failing(ProviderError::Rejected(
            "unsupported codec".to_string(),
        ))),
        Arc::new(FakeInterpreter::new(false)),
    );

    pipeline.submit(text_submission("general")).await.unwrap();
    pipeline.submit(text_submission("custom_survey")).await.unwrap();
    pipeline.submit(audio_submission("general")).await.unwrap();
    assert!(pipeline.wait_for_settled(SETTLE).await);

    let counts = pipeline.status_counts(None).await.unwrap();

    assert_eq!(counts.get(&ProcessingStatus::Completed), Some(&2));
    assert_eq!(counts.get(&ProcessingStatus::TranscriptionFailed), Some(&1));

    pipeline.shutdown().await;
}

#[tokio::test]
async fn test_blank_optional_audio_goes_straight_to_scoring() {
    let transcriber = Arc::new(FakeTranscriber::failing(ProviderError::Rejected(
        "400 url required".to_string(),
    )));
    let pipeline = start(
        Arc::new(InMemoryStore::new()),
        no_reports(),
        transcriber.clone(),
        Arc::new(FakeInterpreter::new(false)),
    );
    let submission: Submission = serde_json::from_value(json!({
        "campaign_id": Uuid::new_v4(),
        "questionnaire": {
            "questionnaire_id": Uuid::new_v4(),
            "questionnaire_type": "general",
            "questions": [
                {"question_id": "essay", "kind": "free_text"},
                {"question_id": "voice_note", "kind": "audio", "required": false}
            ]
        },
        "answers": [
            {"question_id": "essay", "value": "I prefer written feedback and short weekly check-ins"},
            {"question_id": "voice_note", "value": {"audio_url": ""}}
        ]
    }))
    .unwrap();

    let record = run_one(&pipeline, submission).await;

    use ProcessingStatus::*;
    assert_eq!(record.path_since_reset(), vec![Pending, CalculatingScores, Completed]);
    assert_eq!(transcriber.calls.load(Ordering::SeqCst), 0);
    assert!(record.transcriptions.is_none());
    assert!(record.scores.is_some());

    pipeline.shutdown().await;
}
