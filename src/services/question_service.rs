//! Reusable question bank.

use tracing::info;
use uuid::Uuid;

use crate::{
    dao::models::QuestionEntity,
    dto::question::{BankQuestionResponse, QuestionInput},
    error::ServiceError,
    state::SharedState,
};

/// Store a question in the bank, replacing any question with the same id.
pub async fn save_question(
    state: &SharedState,
    input: QuestionInput,
) -> Result<BankQuestionResponse, ServiceError> {
    let store = state.require_game_store().await?;
    let question = input.into_question().map_err(ServiceError::Validation)?;
    let entity = QuestionEntity::from(question);
    store.save_question(entity.clone()).await?;
    info!(question_id = %entity.id, kind = ?entity.kind(), "bank question saved");
    Ok(BankQuestionResponse::from(entity))
}

/// Fetch a bank question with its solution.
pub async fn get_question(
    state: &SharedState,
    question_id: Uuid,
) -> Result<BankQuestionResponse, ServiceError> {
    let store = state.require_game_store().await?;
    store
        .find_question(question_id)
        .await?
        .map(BankQuestionResponse::from)
        .ok_or_else(|| ServiceError::NotFound(format!("question {question_id}")))
}
