pub mod runtime;
pub mod worker;

pub use runtime::*;
pub use worker::*;

use async_trait::async_trait;

use crate::context::PipelineContext;
use crate::error::{SchedulerError, StageError};
use crate::events::StageSummary;
use crate::models::{Stage, WorkUnit};

/// Accepts work units and runs each at least once on its queue, no earlier than its delay
#[async_trait]
pub trait JobScheduler: Send + Sync {
    async fn schedule(&self, unit: WorkUnit) -> Result<(), SchedulerError>;
}

/// What a handler did with a work unit
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerOutcome {
    /// Artifacts written; the summary becomes the completion signal's payload
    Completed(StageSummary),
    /// The record was not eligible (wrong status or superseded generation); no signal is emitted
    Skipped(String),
}

/// Executes one stage for one response
///
/// Handlers must be idempotent: running twice for the same unit leaves the
/// same artifacts as running once. Artifacts are set, never appended.
#[async_trait]
pub trait StageHandler: Send + Sync {
    fn stage(&self) -> Stage;

    async fn handle(&self, ctx: &PipelineContext, unit: &WorkUnit) -> Result<HandlerOutcome, StageError>;
}
