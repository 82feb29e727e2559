use tracing::{debug, info};

use crate::{
    dto::{
        host::DraftView,
        quiz::{QuestionInput, QuestionView},
    },
    error::ServiceError,
    state::SharedState,
};

/// Current host draft.
pub async fn get_draft(state: &SharedState) -> DraftView {
    DraftView::from(&state.draft().await)
}

/// Rename the draft; blank names leave it unchanged.
pub async fn rename_draft(state: &SharedState, name: &str) -> DraftView {
    let renamed = state.with_draft_mut(|draft| draft.rename(name)).await;
    if !renamed {
        debug!("draft rename ignored");
    }
    get_draft(state).await
}

/// Validate and append a question to the draft.
pub async fn add_question(
    state: &SharedState,
    input: QuestionInput,
) -> Result<QuestionView, ServiceError> {
    let (text, kind) = input
        .into_question()
        .map_err(|err| ServiceError::InvalidInput(format!("validation failed: {err}")))?;

    let view = state
        .with_draft_mut(|draft| QuestionView::from(draft.add_question(text, kind)))
        .await;
    info!(question_id = %view.id, "question added to draft");
    Ok(view)
}

/// Remove a question from the draft.
pub async fn delete_question(state: &SharedState, question_id: &str) -> Result<(), ServiceError> {
    let removed = state
        .with_draft_mut(|draft| draft.remove_question(question_id))
        .await;
    if removed {
        Ok(())
    } else {
        Err(ServiceError::NotFound(format!(
            "question `{question_id}` not found in draft"
        )))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dto::quiz::QuestionType,
        oracle::UnconfiguredOracle,
        state::{AppState, draft::DEFAULT_DRAFT_NAME},
    };

    fn question(text: &str) -> QuestionInput {
        QuestionInput {
            text: text.into(),
            question_type: QuestionType::MultipleChoice,
            answer_type: None,
            options: vec!["Paris".into(), "Rome".into()],
            correct_answer: "Paris".into(),
            correct_order: None,
            media_url: None,
        }
    }

    #[tokio::test]
    async fn draft_edits_do_not_need_storage() {
        let state = AppState::new(AppConfig::ephemeral(), Arc::new(UnconfiguredOracle));
        assert_eq!(get_draft(&state).await.name, DEFAULT_DRAFT_NAME);

        let added = add_question(&state, question("What is the capital of France?"))
            .await
            .unwrap();
        assert!(matches!(
            add_question(&state, question("Short")).await,
            Err(ServiceError::InvalidInput(_))
        ));

        let draft = rename_draft(&state, "Venerdì quiz").await;
        assert_eq!(draft.name, "Venerdì quiz");
        assert_eq!(draft.questions.len(), 1);

        delete_question(&state, &added.id).await.unwrap();
        assert!(matches!(
            delete_question(&state, &added.id).await,
            Err(ServiceError::NotFound(_))
        ));
    }
}
