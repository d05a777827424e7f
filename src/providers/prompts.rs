use super::{InterpretationRequest, ReportRequest, TextSource};
use crate::models::RespondentContext;

/// System prompt for interpretation (non-negotiable constraints)
pub const INTERPRETATION_SYSTEM_PROMPT: &str = r#"You are an assessment analyst reviewing a respondent's answers to a questionnaire.

RULES:
1. Base every judgement on the answers provided. Do not invent experience the respondent did not describe.
2. Rate each competency you can evidence on a 0.0-1.0 scale. Omit competencies with no evidence.
3. Transcribed answers may contain recognition errors; do not penalize disfluency or transcription noise.
4. Report your overall confidence (0.0-1.0) in the ratings. Short or thin answers mean low confidence.
5. Output MUST be submitted through the submit_interpretation tool."#;

/// System prompt for the comprehensive report
pub const REPORT_SYSTEM_PROMPT: &str = r#"You are writing a concise assessment report for a hiring or development team.

RULES:
1. Use only the scores and interpretation provided. Do not change or recompute any score.
2. Write 2-5 sections, each with a short title and a body of plain prose.
3. Give concrete, actionable recommendations.
4. If the scores are marked partial, say which inputs were missing.
5. Output MUST be submitted through the submit_report tool."#;

/// Build the user prompt for interpretation
pub fn build_interpretation_prompt(request: &InterpretationRequest) -> String {
    let mut prompt = String::new();

    prompt.push_str(&format!(
        "# Questionnaire: {}\n",
        request.questionnaire_type
    ));
    prompt.push_str(&format_respondent(&request.respondent));
    prompt.push_str(&format!(
        "Answers: {} ({} words)\n\n",
        request.corpus.len(),
        request.word_count()
    ));

    for entry in &request.corpus {
        let source = match entry.source {
            TextSource::Written => "written",
            TextSource::Transcript => "transcribed",
        };
        prompt.push_str(&format!("## {} ({})\n", entry.question_id, source));
        prompt.push_str(&entry.text);
        prompt.push_str("\n\n");
    }

    prompt.push_str("## Instructions\n");
    prompt.push_str("Summarize the respondent in 2-3 sentences, list recurring themes, ");
    prompt.push_str("and rate the competencies the answers give evidence for.\n");

    prompt
}

/// Build the user prompt for the comprehensive report
pub fn build_report_prompt(request: &ReportRequest) -> String {
    let mut prompt = String::new();

    prompt.push_str(&format!(
        "# Questionnaire: {}\n",
        request.questionnaire_type
    ));
    prompt.push_str(&format_respondent(&request.respondent));
    prompt.push('\n');

    prompt.push_str("## Scores\n");
    prompt.push_str("```json\n");
    prompt.push_str(&serde_json::to_string_pretty(&request.scores).unwrap_or_else(|_| "{}".to_string()));
    prompt.push_str("\n```\n\n");

    match &request.interpretation {
        Some(interpretation) => {
            prompt.push_str("## Interpretation\n");
            prompt.push_str(&interpretation.summary);
            prompt.push('\n');
            if !interpretation.themes.is_empty() {
                prompt.push_str(&format!("Themes: {}\n", interpretation.themes.join(", ")));
            }
            prompt.push('\n');
        }
        None => prompt.push_str("## Interpretation\nNot available.\n\n"),
    }

    prompt.push_str("## Instructions\n");
    prompt.push_str("Write the report and submit it using the submit_report tool.\n");

    prompt
}

fn format_respondent(respondent: &RespondentContext) -> String {
    let mut line = String::new();
    if let Some(role) = &respondent.role {
        line.push_str(&format!("Role: {}\n", role));
    }
    if let Some(years) = respondent.experience_years {
        line.push_str(&format!("Experience: {} years\n", years));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ScoringMode, ScoringResult};
    use crate::providers::CorpusEntry;
    use std::collections::BTreeMap;

    #[test]
    fn test_interpretation_prompt_lists_answers() {
        let request = InterpretationRequest {
            questionnaire_type: "leadership".to_string(),
            respondent: RespondentContext {
                role: Some("Engineering Manager".to_string()),
                experience_years: Some(7),
                ..Default::default()
            },
            corpus: vec![CorpusEntry {
                question_id: "conflict".to_string(),
                source: TextSource::Transcript,
                text: "We disagreed on the rollout plan".to_string(),
            }],
        };

        let prompt = build_interpretation_prompt(&request);

        assert!(prompt.contains("# Questionnaire: leadership"));
        assert!(prompt.contains("Experience: 7 years"));
        assert!(prompt.contains("Answers: 1 (6 words)"));
        assert!(prompt.contains("## conflict (transcribed)"));
    }

    #[test]
    fn test_report_prompt_without_interpretation() {
        let request = ReportRequest {
            questionnaire_type: "skills".to_string(),
            respondent: RespondentContext::default(),
            scores: ScoringResult {
                strategy: "skills".to_string(),
                overall: 81.0,
                dimensions: BTreeMap::new(),
                mode: ScoringMode::Full,
                answered: 4,
                notes: vec![],
            },
            interpretation: None,
        };

        let prompt = build_report_prompt(&request);

        assert!(prompt.contains("\"overall\": 81.0"));
        assert!(prompt.contains("Not available."));
    }
}
