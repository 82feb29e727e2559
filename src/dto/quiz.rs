//! Question payloads shared by the host and participant APIs.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidateUrl, ValidationError, ValidationErrors};

use crate::{
    dto::validation::{validate_options, validate_permutation, validate_question_text},
    state::quiz::{Media, MediaKind, Question, QuestionKind},
};

/// Question family as authored.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionType {
    /// Pick one option.
    MultipleChoice,
    /// Free-text answer scored by the host.
    OpenEnded,
    /// Image prompt.
    Image,
    /// Video prompt.
    Video,
    /// Audio prompt.
    Audio,
    /// Arrange the options in order.
    Reorder,
}

impl QuestionType {
    fn media_kind(self) -> Option<MediaKind> {
        match self {
            QuestionType::Image => Some(MediaKind::Image),
            QuestionType::Video => Some(MediaKind::Video),
            QuestionType::Audio => Some(MediaKind::Audio),
            _ => None,
        }
    }
}

/// Scoring sub-mode of media-bearing questions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum AnswerType {
    /// Pick one option.
    MultipleChoice,
    /// Free-text answer scored by the host.
    OpenEnded,
}

/// Payload appending a question to the host draft.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct QuestionInput {
    /// Prompt, at least ten characters.
    pub text: String,
    /// Question family.
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    /// Required for image, video and audio questions, forbidden otherwise.
    #[serde(default)]
    pub answer_type: Option<AnswerType>,
    /// Choices, or the items to order.
    #[serde(default)]
    pub options: Vec<String>,
    /// Must be one of `options` for choice questions; optional reference for open-ended ones.
    #[serde(default)]
    pub correct_answer: String,
    /// Target ordering of a reorder question; defaults to `options` as given.
    #[serde(default)]
    pub correct_order: Option<Vec<String>>,
    /// Media location, required for media-bearing questions.
    #[serde(default)]
    pub media_url: Option<String>,
}

impl QuestionInput {
    fn is_choice(&self) -> bool {
        match self.question_type {
            QuestionType::MultipleChoice => true,
            QuestionType::Image | QuestionType::Video | QuestionType::Audio => {
                self.answer_type == Some(AnswerType::MultipleChoice)
            }
            QuestionType::OpenEnded | QuestionType::Reorder => false,
        }
    }

    /// Validate the payload and turn it into a prompt and a question shape.
    pub fn into_question(self) -> Result<(String, QuestionKind), ValidationErrors> {
        self.validate()?;

        let text = self.text.trim().to_owned();
        let media = self.question_type.media_kind().map(|kind| Media {
            kind,
            url: self.media_url.clone().unwrap_or_default(),
        });
        let choice = self.is_choice();

        let kind = match (self.question_type, media) {
            (QuestionType::Reorder, _) => QuestionKind::Reorder {
                correct_order: self.correct_order.unwrap_or_else(|| self.options.clone()),
                options: self.options,
            },
            (_, Some(media)) if choice => QuestionKind::MediaMultipleChoice {
                media,
                options: self.options,
                correct_answer: self.correct_answer,
            },
            (_, Some(media)) => QuestionKind::MediaOpenEnded {
                media,
                correct_answer: self.correct_answer,
            },
            (_, None) if choice => QuestionKind::MultipleChoice {
                options: self.options,
                correct_answer: self.correct_answer,
            },
            (_, None) => QuestionKind::OpenEnded {
                correct_answer: self.correct_answer,
            },
        };

        Ok((text, kind))
    }
}

impl Validate for QuestionInput {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Err(e) = validate_question_text(&self.text) {
            errors.add("text", e);
        }

        let is_media = self.question_type.media_kind().is_some();
        if is_media {
            if self.answer_type.is_none() {
                errors.add("answer_type", error("answer_type_required"));
            }
            match self.media_url.as_deref() {
                Some(url) if url.validate_url() => {}
                Some(_) => errors.add("media_url", error("url")),
                None => errors.add("media_url", error("media_url_required")),
            }
        } else if self.answer_type.is_some() {
            errors.add("answer_type", error("answer_type_forbidden"));
        }

        if self.is_choice() || self.question_type == QuestionType::Reorder {
            if let Err(e) = validate_options(&self.options) {
                errors.add("options", e);
            }
        }

        if self.is_choice() && !self.options.contains(&self.correct_answer) {
            errors.add("correct_answer", error("correct_answer_not_an_option"));
        }

        if self.question_type == QuestionType::Reorder {
            if let Some(order) = &self.correct_order {
                if let Err(e) = validate_permutation(&self.options, order) {
                    errors.add("correct_order", e);
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn error(code: &'static str) -> ValidationError {
    ValidationError::new(code)
}

fn describe(kind: &QuestionKind) -> (QuestionType, Option<AnswerType>, Option<String>) {
    let media_type = |media: &Media| match media.kind {
        MediaKind::Image => QuestionType::Image,
        MediaKind::Video => QuestionType::Video,
        MediaKind::Audio => QuestionType::Audio,
    };

    match kind {
        QuestionKind::MultipleChoice { .. } => (QuestionType::MultipleChoice, None, None),
        QuestionKind::OpenEnded { .. } => (QuestionType::OpenEnded, None, None),
        QuestionKind::Reorder { .. } => (QuestionType::Reorder, None, None),
        QuestionKind::MediaMultipleChoice { media, .. } => (
            media_type(media),
            Some(AnswerType::MultipleChoice),
            Some(media.url.clone()),
        ),
        QuestionKind::MediaOpenEnded { media, .. } => (
            media_type(media),
            Some(AnswerType::OpenEnded),
            Some(media.url.clone()),
        ),
    }
}

fn solution(kind: &QuestionKind) -> (Option<String>, Option<Vec<String>>) {
    match kind {
        QuestionKind::MultipleChoice { correct_answer, .. }
        | QuestionKind::OpenEnded { correct_answer }
        | QuestionKind::MediaMultipleChoice { correct_answer, .. }
        | QuestionKind::MediaOpenEnded { correct_answer, .. } => {
            (Some(correct_answer.clone()), None)
        }
        QuestionKind::Reorder { correct_order, .. } => (None, Some(correct_order.clone())),
    }
}

/// Full question, solution included, as seen by the host.
#[derive(Debug, Serialize, ToSchema)]
pub struct QuestionView {
    /// Question id.
    pub id: String,
    /// Prompt.
    pub text: String,
    /// Question family.
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    /// Scoring sub-mode of media questions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer_type: Option<AnswerType>,
    /// Choices in authored order.
    pub options: Vec<String>,
    /// Reference answer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<String>,
    /// Target ordering of a reorder question.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_order: Option<Vec<String>>,
    /// Media shown with the prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
}

impl From<&Question> for QuestionView {
    fn from(value: &Question) -> Self {
        let (question_type, answer_type, media_url) = describe(&value.kind);
        let (correct_answer, correct_order) = solution(&value.kind);
        Self {
            id: value.id.clone(),
            text: value.text.clone(),
            question_type,
            answer_type,
            options: value.options().to_vec(),
            correct_answer,
            correct_order,
            media_url,
        }
    }
}

/// Question as shown to a participant. The solution is only present once revealed.
#[derive(Debug, Serialize, ToSchema)]
pub struct ParticipantQuestionView {
    /// Question id.
    pub id: String,
    /// Prompt.
    pub text: String,
    /// Question family.
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    /// Scoring sub-mode of media questions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer_type: Option<AnswerType>,
    /// Options in presentation order; shuffled for reorder questions.
    pub options: Vec<String>,
    /// Media shown with the prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    /// Reference answer, once revealed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<String>,
    /// Target ordering, once revealed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_order: Option<Vec<String>>,
}

impl ParticipantQuestionView {
    /// Build the view with options already arranged for this participant.
    pub fn new(question: &Question, options: Vec<String>, reveal: bool) -> Self {
        let (question_type, answer_type, media_url) = describe(&question.kind);
        let (correct_answer, correct_order) = if reveal {
            solution(&question.kind)
        } else {
            (None, None)
        };

        Self {
            id: question.id.clone(),
            text: question.text.clone(),
            question_type,
            answer_type,
            options,
            media_url,
            correct_answer,
            correct_order,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(question_type: QuestionType) -> QuestionInput {
        QuestionInput {
            text: "What is the capital of France?".into(),
            question_type,
            answer_type: None,
            options: vec!["Paris".into(), "Rome".into()],
            correct_answer: "Paris".into(),
            correct_order: None,
            media_url: None,
        }
    }

    #[test]
    fn multiple_choice_requires_answer_among_options() {
        let mut payload = input(QuestionType::MultipleChoice);
        let (text, kind) = payload.clone().into_question().unwrap();
        assert_eq!(text, "What is the capital of France?");
        assert!(matches!(kind, QuestionKind::MultipleChoice { .. }));

        payload.correct_answer = "Berlin".into();
        let errors = payload.into_question().unwrap_err();
        assert!(errors.field_errors().contains_key("correct_answer"));
    }

    #[test]
    fn answer_type_is_required_exactly_for_media() {
        let mut image = input(QuestionType::Image);
        image.media_url = Some("https://cdn.example/eiffel.jpg".into());
        let errors = image.clone().into_question().unwrap_err();
        assert!(errors.field_errors().contains_key("answer_type"));

        image.answer_type = Some(AnswerType::MultipleChoice);
        let (_, kind) = image.into_question().unwrap();
        match kind {
            QuestionKind::MediaMultipleChoice { media, .. } => {
                assert_eq!(media.kind, MediaKind::Image);
            }
            other => panic!("unexpected kind {other:?}"),
        }

        let mut open = input(QuestionType::OpenEnded);
        open.answer_type = Some(AnswerType::OpenEnded);
        assert!(open.into_question().is_err());
    }

    #[test]
    fn media_url_must_be_a_url() {
        let mut audio = input(QuestionType::Audio);
        audio.answer_type = Some(AnswerType::OpenEnded);
        audio.media_url = Some("not a url".into());
        let errors = audio.into_question().unwrap_err();
        assert!(errors.field_errors().contains_key("media_url"));
    }

    #[test]
    fn reorder_defaults_target_to_authored_options() {
        let mut reorder = input(QuestionType::Reorder);
        let (_, kind) = reorder.clone().into_question().unwrap();
        assert_eq!(
            kind,
            QuestionKind::Reorder {
                options: vec!["Paris".into(), "Rome".into()],
                correct_order: vec!["Paris".into(), "Rome".into()],
            }
        );

        reorder.correct_order = Some(vec!["Rome".into(), "Milan".into()]);
        assert!(reorder.into_question().is_err());
    }

    #[test]
    fn short_text_is_rejected() {
        let mut payload = input(QuestionType::OpenEnded);
        payload.text = "Why?".into();
        let errors = payload.into_question().unwrap_err();
        assert!(errors.field_errors().contains_key("text"));
    }

    #[test]
    fn participant_view_hides_solution_until_revealed() {
        let question = Question {
            id: "q1".into(),
            text: "What is the capital of France?".into(),
            kind: QuestionKind::MultipleChoice {
                options: vec!["Paris".into(), "Rome".into()],
                correct_answer: "Paris".into(),
            },
        };

        let hidden = ParticipantQuestionView::new(&question, question.options().to_vec(), false);
        assert!(hidden.correct_answer.is_none());
        let value = serde_json::to_value(&hidden).unwrap();
        assert_eq!(value["type"], "multiple-choice");
        assert!(value.get("correct_answer").is_none());

        let shown = ParticipantQuestionView::new(&question, question.options().to_vec(), true);
        assert_eq!(shown.correct_answer.as_deref(), Some("Paris"));
    }
}
