use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{ResponseRecord, ScoringMode};

/// Machine-readable outcome of a processing run
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingSummary {
    pub generated_at: DateTime<Utc>,
    pub total: usize,
    /// Responses per processing status
    pub status_counts: BTreeMap<String, usize>,
    pub responses: Vec<ResponseSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseSummary {
    pub response_id: Uuid,
    pub campaign_id: Uuid,
    pub questionnaire_type: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scoring_mode: Option<ScoringMode>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub dimensions: BTreeMap<String, f64>,
    pub transcribed_answers: usize,
    pub has_interpretation: bool,
    pub has_report: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turnaround_seconds: Option<i64>,
}

impl From<&ResponseRecord> for ResponseSummary {
    fn from(record: &ResponseRecord) -> Self {
        Self {
            response_id: record.id,
            campaign_id: record.campaign_id,
            questionnaire_type: record.questionnaire_type.clone(),
            status: record.processing_status.to_string(),
            overall_score: record.scores.as_ref().map(|s| s.overall),
            scoring_mode: record.scores.as_ref().map(|s| s.mode),
            dimensions: record
                .scores
                .as_ref()
                .map(|s| s.dimensions.clone())
                .unwrap_or_default(),
            transcribed_answers: record.transcriptions.as_ref().map_or(0, |t| t.len()),
            has_interpretation: record.ai_analysis.is_some(),
            has_report: record.report.is_some(),
            last_error: record.last_error.clone(),
            turnaround_seconds: record.timestamps.turnaround_seconds(),
        }
    }
}

impl ProcessingSummary {
    pub fn from_records(records: &[ResponseRecord], generated_at: DateTime<Utc>) -> Self {
        let mut status_counts = BTreeMap::new();
        for record in records {
            *status_counts
                .entry(record.processing_status.to_string())
                .or_insert(0) += 1;
        }

        Self {
            generated_at,
            total: records.len(),
            status_counts,
            responses: records.iter().map(ResponseSummary::from).collect(),
        }
    }

    /// Responses that did not reach a scored state
    pub fn unscored(&self) -> usize {
        self.responses
            .iter()
            .filter(|r| r.overall_score.is_none())
            .count()
    }

    /// Write to a JSON file
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create file: {:?}", path))?;
        serde_json::to_writer_pretty(file, self).context("Failed to write JSON")?;
        Ok(())
    }
}
