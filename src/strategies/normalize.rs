use crate::models::{
    count_words, AnswerMetadata, AnswerShape, AnswerValue, NormalizedAnswer, QuestionKind,
    Questionnaire, RawAnswer,
};

use super::validation::numeric_value;

/// Classify each answer by shape and attach the metadata scoring relies on
///
/// - audio references become `AudioBearing`, carrying the declared duration
/// - choice lists become `MultiSelect`
/// - numbers, and text answering a scale or numeric question that parses as a number, become `Numeric`
/// - everything else is `FreeText` with word and character counts
pub fn classify_answers(questionnaire: &Questionnaire, answers: &[RawAnswer]) -> Vec<NormalizedAnswer> {
    answers
        .iter()
        .map(|answer| classify_answer(questionnaire, answer))
        .collect()
}

fn classify_answer(questionnaire: &Questionnaire, answer: &RawAnswer) -> NormalizedAnswer {
    let question = questionnaire.question(&answer.question_id);
    let expects_number = question
        .is_some_and(|q| matches!(q.kind, QuestionKind::Scale | QuestionKind::Numeric));
    let scale = question
        .filter(|q| q.kind == QuestionKind::Scale)
        .map(|q| q.scale.unwrap_or_default());

    let mut metadata = AnswerMetadata::default();

    let (shape, value) = match &answer.value {
        AnswerValue::Audio {
            audio_url,
            duration_seconds,
        } => {
            metadata.audio_duration_seconds = *duration_seconds;
            (
                AnswerShape::AudioBearing,
                AnswerValue::Audio {
                    audio_url: audio_url.trim().to_string(),
                    duration_seconds: *duration_seconds,
                },
            )
        }
        AnswerValue::Choices(choices) => {
            metadata.selected_count = choices.len();
            (AnswerShape::MultiSelect, answer.value.clone())
        }
        value if expects_number && numeric_value(value).is_some() => {
            let n = numeric_value(value).unwrap_or_default();
            metadata.numeric_value = Some(n);
            metadata.scale = scale;
            (AnswerShape::Numeric, AnswerValue::Number(n))
        }
        AnswerValue::Number(n) => {
            metadata.numeric_value = Some(*n);
            metadata.scale = scale;
            (AnswerShape::Numeric, answer.value.clone())
        }
        AnswerValue::Text(text) => {
            let text = text.trim();
            metadata.word_count = count_words(text);
            metadata.char_count = text.chars().count();
            (AnswerShape::FreeText, AnswerValue::Text(text.to_string()))
        }
    };

    NormalizedAnswer {
        question_id: answer.question_id.clone(),
        shape,
        value,
        metadata,
        dimension: question.and_then(|q| q.dimension.clone()),
    }
}
