use std::time::Duration;

use crate::models::{QueueName, Stage};

/// Top-level pipeline settings
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub retry: RetryPolicy,
    pub delays: DelayConfig,
    pub queues: QueueConfig,
    /// Schedule the report stage after scoring completes
    pub generate_reports: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            delays: DelayConfig::default(),
            queues: QueueConfig::default(),
            generate_reports: true,
        }
    }
}

impl PipelineConfig {
    /// No delays and no backoff, for tests and dry runs
    pub fn immediate() -> Self {
        Self {
            retry: RetryPolicy {
                initial_backoff: Duration::ZERO,
                ..Default::default()
            },
            delays: DelayConfig::zero(),
            ..Default::default()
        }
    }
}

/// Attempt budget shared by the stage workers and the orchestrator loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Wait before the given retry (attempt 1 is the first retry)
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    pub fn allows_another(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts.max(1)
    }
}

/// Longest delay a scaled configuration may ask for
pub const MAX_STAGE_DELAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Minimum wait before each stage's work unit may run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayConfig {
    pub transcription: Duration,
    pub interpretation: Duration,
    pub scoring: Duration,
    pub report: Duration,
    /// Scoring scheduled after AI interpretation failed
    pub fallback_scoring: Duration,
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            transcription: Duration::from_secs(5),
            interpretation: Duration::from_secs(10),
            scoring: Duration::from_secs(5),
            report: Duration::from_secs(30),
            fallback_scoring: Duration::from_secs(2),
        }
    }
}

impl DelayConfig {
    pub fn zero() -> Self {
        Self {
            transcription: Duration::ZERO,
            interpretation: Duration::ZERO,
            scoring: Duration::ZERO,
            report: Duration::ZERO,
            fallback_scoring: Duration::ZERO,
        }
    }

    pub fn for_stage(&self, stage: Stage) -> Duration {
        match stage {
            Stage::Transcription => self.transcription,
            Stage::Interpretation => self.interpretation,
            Stage::Scoring => self.scoring,
            Stage::Report => self.report,
        }
    }

    /// Multiply every delay, capped at `MAX_STAGE_DELAY`; negative or non-finite factors count as zero
    pub fn scaled(&self, factor: f64) -> Self {
        let factor = if factor.is_finite() { factor.max(0.0) } else { 0.0 };
        let scale = |d: Duration| {
            Duration::try_from_secs_f64(d.as_secs_f64() * factor)
                .map_or(MAX_STAGE_DELAY, |scaled| scaled.min(MAX_STAGE_DELAY))
        };
        Self {
            transcription: scale(self.transcription),
            interpretation: scale(self.interpretation),
            scoring: scale(self.scoring),
            report: scale(self.report),
            fallback_scoring: scale(self.fallback_scoring),
        }
    }
}

/// Per-queue worker concurrency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    pub audio_processing: usize,
    pub ai_processing: usize,
    pub scoring: usize,
    pub reporting: usize,
    /// Buffered units per queue before senders wait
    pub capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            audio_processing: 2,
            ai_processing: 4,
            scoring: 8,
            reporting: 2,
            capacity: 256,
        }
    }
}

impl QueueConfig {
    pub fn concurrency(&self, queue: QueueName) -> usize {
        let limit = match queue {
            QueueName::AudioProcessing => self.audio_processing,
            QueueName::AiProcessing => self.ai_processing,
            QueueName::Scoring => self.scoring,
            QueueName::Reporting => self.reporting,
        };
        limit.max(1)
    }
}
