use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Questionnaire, RawAnswer, RespondentContext};

/// A respondent's answers as handed over by the request-handling layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    /// Caller-chosen id; generated when absent
    #[serde(default)]
    pub response_id: Option<Uuid>,
    pub campaign_id: Uuid,
    pub questionnaire: Questionnaire,
    #[serde(default)]
    pub respondent: RespondentContext,
    pub answers: Vec<RawAnswer>,
}

impl Submission {
    pub fn questionnaire_type(&self) -> &str {
        &self.questionnaire.questionnaire_type
    }
}
