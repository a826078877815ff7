//! Buzzes, answers, clues and timer expiry on the current question.

use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dto::game::{AnswerRequest, GameResponse, QuestionActionRequest},
    error::ServiceError,
    services::game_service::run_game_transaction,
    state::SharedState,
};

/// Put the caller in the buzz queue of the current question.
pub async fn buzz(
    state: &SharedState,
    game_id: Uuid,
    actor: Uuid,
    request: QuestionActionRequest,
) -> Result<GameResponse, ServiceError> {
    let question_id = request.question_id;
    let (game, ()) = run_game_transaction(state, game_id, |game, now| {
        game.buzz(actor, question_id, now).map_err(Into::into)
    })
    .await?;
    debug!(%game_id, %question_id, player_id = %actor, "buzz recorded");
    Ok(GameResponse::from(&game))
}

/// Grade the caller's answer and credit its points.
pub async fn submit_answer(
    state: &SharedState,
    game_id: Uuid,
    actor: Uuid,
    request: AnswerRequest,
) -> Result<GameResponse, ServiceError> {
    let AnswerRequest {
        question_id,
        answer,
    } = request;
    let (game, ()) = run_game_transaction(state, game_id, |game, now| {
        game.submit_answer(actor, question_id, answer.clone(), now)
            .map_err(Into::into)
    })
    .await?;
    info!(%game_id, %question_id, player_id = %actor, status = ?game.status, "answer submitted");
    Ok(GameResponse::from(&game))
}

/// Reveal one more clue of a progressive-clues question.
pub async fn reveal_clue(
    state: &SharedState,
    game_id: Uuid,
    actor: Uuid,
    request: QuestionActionRequest,
) -> Result<GameResponse, ServiceError> {
    let question_id = request.question_id;
    let (game, ()) = run_game_transaction(state, game_id, |game, now| {
        game.reveal_clue(actor, question_id, now).map_err(Into::into)
    })
    .await?;
    Ok(GameResponse::from(&game))
}

/// Close the current question once its timer ran out. Any client may report it.
pub async fn expire_question(
    state: &SharedState,
    game_id: Uuid,
    request: QuestionActionRequest,
) -> Result<GameResponse, ServiceError> {
    let question_id = request.question_id;
    let (game, ()) = run_game_transaction(state, game_id, |game, now| {
        game.expire_question(question_id, now).map_err(Into::into)
    })
    .await?;
    info!(%game_id, %question_id, status = ?game.status, "question expired");
    Ok(GameResponse::from(&game))
}
