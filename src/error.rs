use thiserror::Error;
use uuid::Uuid;

use crate::models::ProcessingStatus;

/// Attempted move that is not an edge of the pipeline graph
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition from {from} to {to}")]
pub struct InvalidTransition {
    pub from: ProcessingStatus,
    pub to: ProcessingStatus,
}

/// Field-level problem found before a submission enters the pipeline
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Reasons a submission never becomes a Response Record
#[derive(Debug, Error)]
pub enum SubmissionError {
    /// Validation found problems; reported back to the submitter
    #[error("submission rejected with {} validation error(s)", .0.len())]
    Rejected(Vec<ValidationError>),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// The pipeline is no longer accepting signals
    #[error("pipeline is shut down")]
    Closed,
}

/// Errors returned by a response store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("response not found: {0}")]
    NotFound(Uuid),

    #[error("response already exists: {0}")]
    AlreadyExists(Uuid),

    /// Another writer updated the record since it was read
    #[error("concurrent update on response {id}: expected version {expected_version}")]
    ConcurrentConflict { id: Uuid, expected_version: u64 },

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Errors returned by the job scheduler
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// No worker is consuming the queue any more
    #[error("queue {0} is closed")]
    QueueClosed(String),

    #[error("scheduler error: {0}")]
    Other(String),
}

/// Errors raised while the orchestrator decides the next stage
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Transition(#[from] InvalidTransition),
}

/// Errors returned by an external collaborator (transcription, AI, report)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// Network trouble, rate limiting or a 5xx; worth another attempt
    #[error("transient provider error: {0}")]
    Transient(String),

    /// The provider gave a definitive answer that it cannot do the work
    #[error("provider rejected request: {0}")]
    Rejected(String),
}

/// Errors returned by a stage handler to the worker
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StageError {
    /// Spend another attempt if the budget allows
    #[error("{0}")]
    Retryable(String),

    /// Stop retrying and report the failure now
    #[error("{0}")]
    Fatal(String),
}

impl StageError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StageError::Retryable(_))
    }
}

impl From<ProviderError> for StageError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Transient(_) => StageError::Retryable(err.to_string()),
            ProviderError::Rejected(_) => StageError::Fatal(err.to_string()),
        }
    }
}

impl From<InvalidTransition> for StageError {
    fn from(err: InvalidTransition) -> Self {
        StageError::Fatal(err.to_string())
    }
}

impl From<StoreError> for StageError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => StageError::Fatal(err.to_string()),
            _ => StageError::Retryable(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_maps_to_stage_error() {
        let transient: StageError = ProviderError::Transient("503".to_string()).into();
        let rejected: StageError = ProviderError::Rejected("unsupported codec".to_string()).into();

        assert!(transient.is_retryable());
        assert!(!rejected.is_retryable());
        assert_eq!(
            rejected.to_string(),
            "provider rejected request: unsupported codec"
        );
    }

    #[test]
    fn test_store_conflict_is_retryable() {
        let err: StageError = StoreError::ConcurrentConflict {
            id: Uuid::nil(),
            expected_version: 3,
        }
        .into();
        assert!(err.is_retryable());

        let missing: StageError = StoreError::NotFound(Uuid::nil()).into();
        assert!(!missing.is_retryable());
    }

    #[test]
    fn test_rejected_submission_message() {
        let err = SubmissionError::Rejected(vec![
            ValidationError::new("answers.q1", "is required"),
            ValidationError::new("answers.q2", "is required"),
        ]);
        assert_eq!(err.to_string(), "submission rejected with 2 validation error(s)");
    }
}
