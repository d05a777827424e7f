pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod handlers;
pub mod io;
pub mod jobs;
pub mod models;
pub mod orchestrator;
pub mod providers;
pub mod store;
pub mod strategies;

pub use config::{DelayConfig, PipelineConfig, QueueConfig, RetryPolicy};
pub use context::{Clock, FixedClock, PipelineContext, SystemClock};
pub use error::{
    PipelineError, ProviderError, SchedulerError, StageError, StoreError, SubmissionError,
    ValidationError,
};
pub use events::{PipelineEvent, ResponseSubmitted, StageCompleted, StageOutcome, StageSummary};
pub use handlers::{InterpretationHandler, ReportHandler, ScoringHandler, TranscriptionHandler};
pub use io::{parse_submissions_file, parse_submissions_json, ProcessingSummary};
pub use jobs::{HandlerOutcome, JobScheduler, Pipeline, StageHandler, Worker};
pub use models::{ProcessingStatus, ResponseRecord, Stage, Submission, WorkUnit};
pub use orchestrator::{Decision, Orchestrator};
pub use providers::{
    AnthropicClient, AnthropicConfig, DeepgramConfig, DeepgramTranscriber, Interpreter,
    ReportSynthesizer, Transcriber,
};
pub use store::{InMemoryStore, ResponseStore};
pub use strategies::{ResponseStrategy, StrategyKind, StrategyRegistry};
