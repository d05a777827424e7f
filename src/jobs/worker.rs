use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::{HandlerOutcome, StageHandler};
use crate::config::RetryPolicy;
use crate::context::PipelineContext;
use crate::events::StageCompleted;
use crate::models::{Stage, WorkUnit};

/// Runs work units against their stage handler under the retry policy
pub struct Worker {
    ctx: PipelineContext,
    handlers: HashMap<Stage, Arc<dyn StageHandler>>,
    retry: RetryPolicy,
}

impl Worker {
    pub fn new(ctx: PipelineContext, retry: RetryPolicy) -> Self {
        Self {
            ctx,
            handlers: HashMap::new(),
            retry,
        }
    }

    /// Register or replace the handler for its stage
    pub fn with_handler(mut self, handler: Arc<dyn StageHandler>) -> Self {
        self.handlers.insert(handler.stage(), handler);
        self
    }

    pub fn handles(&self, stage: Stage) -> bool {
        self.handlers.contains_key(&stage)
    }

    /// Execute a unit until it succeeds, is skipped, or exhausts its attempts
    ///
    /// Returns the completion signal to feed back to the orchestrator, or
    /// `None` when the handler skipped the unit.
    pub async fn execute(&self, unit: &WorkUnit) -> Option<StageCompleted> {
        let Some(handler) = self.handlers.get(&unit.stage) else {
            error!("No handler registered for {}", unit.stage);
            return Some(StageCompleted::failed(
                unit.response_id,
                unit.stage,
                unit.generation,
                format!("no handler registered for {}", unit.stage),
                0,
            ));
        };

        let mut attempt = 1;
        loop {
            debug!("Running {} (attempt {}/{})", unit, attempt, self.retry.max_attempts);

            match handler.handle(&self.ctx, unit).await {
                Ok(HandlerOutcome::Completed(summary)) => {
                    info!(
                        "{} succeeded for {} (attempt {})",
                        unit.stage, unit.response_id, attempt
                    );
                    return Some(StageCompleted::succeeded(
                        unit.response_id,
                        unit.generation,
                        summary,
                    ));
                }
                Ok(HandlerOutcome::Skipped(reason)) => {
                    debug!("Skipped {}: {}", unit, reason);
                    return None;
                }
                Err(err) if err.is_retryable() && self.retry.allows_another(attempt) => {
                    let backoff = self.retry.backoff_for(attempt);
                    warn!(
                        "{} failed for {} (attempt {}), retrying in {:?}: {}",
                        unit.stage, unit.response_id, attempt, backoff, err
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(err) => {
                    error!(
                        "{} failed for {} after {} attempt(s): {}",
                        unit.stage, unit.response_id, attempt, err
                    );
                    return Some(StageCompleted::failed(
                        unit.response_id,
                        unit.stage,
                        unit.generation,
                        err.to_string(),
                        attempt,
                    ));
                }
            }
        }
    }
}
