use std::collections::HashSet;

use crate::error::ValidationError;
use crate::models::{count_words, AnswerValue, Question, QuestionKind, Questionnaire, RawAnswer};

/// Rules every questionnaire type shares
///
/// 1. Every answer belongs to the questionnaire, at most once
/// 2. Required questions have a non-empty answer
/// 3. The value fits the question kind (scale bounds, allowed options, minimum words)
pub fn validate_common(questionnaire: &Questionnaire, answers: &[RawAnswer]) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for answer in answers {
        let field = answer_field(&answer.question_id);

        if !seen.insert(answer.question_id.as_str()) {
            errors.push(ValidationError::new(&field, "answered more than once"));
            continue;
        }

        match questionnaire.question(&answer.question_id) {
            Some(question) => errors.extend(validate_value(question, &answer.value, &field)),
            None => errors.push(ValidationError::new(
                &field,
                "does not belong to this questionnaire",
            )),
        }
    }

    for question in questionnaire.questions.iter().filter(|q| q.required) {
        let answered = answers
            .iter()
            .find(|a| a.question_id == question.question_id)
            .is_some_and(|a| !is_blank(&a.value));

        if !answered {
            errors.push(ValidationError::new(
                answer_field(&question.question_id),
                "is required",
            ));
        }
    }

    errors
}

/// Check a single value against its question definition
fn validate_value(question: &Question, value: &AnswerValue, field: &str) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    // Blank answers are only an error when required, which is checked separately
    if is_blank(value) {
        return errors;
    }

    match (question.kind, value) {
        (QuestionKind::Audio, AnswerValue::Audio { duration_seconds, .. }) => {
            if duration_seconds.is_some_and(|d| d < 0.0) {
                errors.push(ValidationError::new(field, "audio duration cannot be negative"));
            }
        }
        (QuestionKind::Scale, _) => match numeric_value(value) {
            Some(n) => {
                let scale = question.scale.unwrap_or_default();
                if !scale.contains(n) {
                    errors.push(ValidationError::new(
                        field,
                        format!("must be between {} and {}", scale.min, scale.max),
                    ));
                }
            }
            None => errors.push(ValidationError::new(field, "must be a rating")),
        },
        (QuestionKind::Numeric, _) => {
            if numeric_value(value).is_none() {
                errors.push(ValidationError::new(field, "must be a number"));
            }
        }
        (QuestionKind::MultiSelect, AnswerValue::Choices(choices)) => {
            if !question.options.is_empty() {
                for choice in choices.iter().filter(|c| !question.options.contains(c)) {
                    errors.push(ValidationError::new(
                        field,
                        format!("'{}' is not an allowed option", choice),
                    ));
                }
            }
        }
        (QuestionKind::FreeText, AnswerValue::Text(text)) => {
            if let Some(min_words) = question.min_words {
                let words = count_words(text);
                if words < min_words {
                    errors.push(ValidationError::new(
                        field,
                        format!("needs at least {} words (got {})", min_words, words),
                    ));
                }
            }
        }
        (kind, _) => errors.push(ValidationError::new(
            field,
            format!("expected {} answer", kind_label(kind)),
        )),
    }

    errors
}

/// Whether an answer carries no content at all
pub fn is_blank(value: &AnswerValue) -> bool {
    match value {
        AnswerValue::Text(text) => text.trim().is_empty(),
        AnswerValue::Choices(choices) => choices.is_empty(),
        AnswerValue::Audio { audio_url, .. } => audio_url.trim().is_empty(),
        AnswerValue::Number(n) => !n.is_finite(),
    }
}

/// Numbers, and text that parses as one
pub fn numeric_value(value: &AnswerValue) -> Option<f64> {
    match value {
        AnswerValue::Number(n) if n.is_finite() => Some(*n),
        AnswerValue::Text(text) => text.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

pub fn answer_field(question_id: &str) -> String {
    format!("answers.{}", question_id)
}

fn kind_label(kind: QuestionKind) -> &'static str {
    match kind {
        QuestionKind::FreeText => "a text",
        QuestionKind::Audio => "an audio",
        QuestionKind::MultiSelect => "a multi-select",
        QuestionKind::Scale => "a rating",
        QuestionKind::Numeric => "a numeric",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ScaleRange;
    use uuid::Uuid;

    fn question(id: &str, kind: QuestionKind) -> Question {
        Question {
            question_id: id.to_string(),
            kind,
            required: true,
            prompt: String::new(),
            options: vec![],
            correct_options: vec![],
            scale: None,
            dimension: None,
            reverse_scored: false,
            min_words: None,
        }
    }

    fn questionnaire(questions: Vec<Question>) -> Questionnaire {
        Questionnaire {
            questionnaire_id: Uuid::new_v4(),
            questionnaire_type: "general".to_string(),
            questions,
        }
    }

    fn answer(id: &str, value: AnswerValue) -> RawAnswer {
        RawAnswer {
            question_id: id.to_string(),
            value,
        }
    }

    #[test]
    fn test_missing_required_answer() {
        let q = questionnaire(vec![question("q1", QuestionKind::FreeText)]);
        let errors = validate_common(&q, &[answer("q1", AnswerValue::Text("   ".to_string()))]);

        assert_eq!(errors, vec![ValidationError::new("answers.q1", "is required")]);
    }

    #[test]
    fn test_optional_blank_answer_is_fine() {
        let mut optional = question("q1", QuestionKind::FreeText);
        optional.required = false;
        let q = questionnaire(vec![optional]);

        assert!(validate_common(&q, &[]).is_empty());
    }

    #[test]
    fn test_unknown_and_duplicate_answers() {
        let q = questionnaire(vec![question("q1", QuestionKind::Numeric)]);
        let errors = validate_common(
            &q,
            &[
                answer("q1", AnswerValue::Number(1.0)),
                answer("q1", AnswerValue::Number(2.0)),
                answer("q9", AnswerValue::Number(3.0)),
            ],
        );

        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].message, "answered more than once");
        assert_eq!(errors[1].field, "answers.q9");
    }

    #[test]
    fn test_scale_bounds() {
        let mut rating = question("q1", QuestionKind::Scale);
        rating.scale = Some(ScaleRange { min: 1.0, max: 7.0 });
        let q = questionnaire(vec![rating]);

        assert!(validate_common(&q, &[answer("q1", AnswerValue::Text("6".to_string()))]).is_empty());

        let errors = validate_common(&q, &[answer("q1", AnswerValue::Number(8.0))]);
        assert_eq!(errors[0].message, "must be between 1 and 7");
    }

    #[test]
    fn test_disallowed_option() {
        let mut select = question("q1", QuestionKind::MultiSelect);
        select.options = vec!["a".to_string(), "b".to_string()];
        let q = questionnaire(vec![select]);

        let errors = validate_common(
            &q,
            &[answer("q1", AnswerValue::Choices(vec!["a".to_string(), "z".to_string()]))],
        );

        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("'z'"));
    }

    #[test]
    fn test_kind_mismatch() {
        let q = questionnaire(vec![question("q1", QuestionKind::Audio)]);
        let errors = validate_common(&q, &[answer("q1", AnswerValue::Text("hi".to_string()))]);

        assert_eq!(errors[0].message, "expected an audio answer");
    }

    #[test]
    fn test_min_words() {
        let mut essay = question("q1", QuestionKind::FreeText);
        essay.min_words = Some(5);
        let q = questionnaire(vec![essay]);

        let errors = validate_common(&q, &[answer("q1", AnswerValue::Text("too short".to_string()))]);
        assert_eq!(errors[0].message, "needs at least 5 words (got 2)");
    }
}
