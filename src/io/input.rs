use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::models::Submission;

/// A file holds either one submission or a list of them
#[derive(Deserialize)]
#[serde(untagged)]
enum SubmissionFile {
    Many(Vec<Submission>),
    One(Box<Submission>),
}

/// Parse a submissions JSON file
pub fn parse_submissions_file(path: &Path) -> Result<Vec<Submission>> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {:?}", path))?;
    parse_submissions_json(&content)
}

/// Parse submissions from a JSON string
pub fn parse_submissions_json(json: &str) -> Result<Vec<Submission>> {
    let parsed: SubmissionFile =
        serde_json::from_str(json).context("Failed to parse submissions JSON")?;
    Ok(match parsed {
        SubmissionFile::Many(submissions) => submissions,
        SubmissionFile::One(submission) => vec![*submission],
    })
}
