use axum::{
    Json, Router,
    extract::{Path, State},
    routing::post,
};
use uuid::Uuid;

use crate::{
    dto::game::{AnswerRequest, GameResponse, QuestionActionRequest},
    error::AppError,
    routes::Actor,
    services::play_service,
    state::SharedState,
};

/// Routes acting on the question being played.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/games/{id}/question/buzz", post(buzz))
        .route("/games/{id}/question/answer", post(submit_answer))
        .route("/games/{id}/question/clue", post(reveal_clue))
        .route("/games/{id}/question/expire", post(expire_question))
}

/// Buzz on the current question.
#[utoipa::path(
    post,
    path = "/games/{id}/question/buzz",
    tag = "play",
    params(
        ("id" = Uuid, Path, description = "Game identifier"),
        ("X-User-Id" = Uuid, Header, description = "Buzzing player")
    ),
    request_body = QuestionActionRequest,
    responses(
        (status = 200, description = "Buzz queued, or ignored for a stale question", body = GameResponse),
        (status = 409, description = "Question not accepting buzzes or player already answered")
    )
)]
pub async fn buzz(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Actor(actor): Actor,
    Json(payload): Json<QuestionActionRequest>,
) -> Result<Json<GameResponse>, AppError> {
    Ok(Json(play_service::buzz(&state, id, actor, payload).await?))
}

/// Submit an answer to the current question.
#[utoipa::path(
    post,
    path = "/games/{id}/question/answer",
    tag = "play",
    params(
        ("id" = Uuid, Path, description = "Game identifier"),
        ("X-User-Id" = Uuid, Header, description = "Answering player")
    ),
    request_body = AnswerRequest,
    responses(
        (status = 200, description = "Answer graded, or ignored for a stale question", body = GameResponse),
        (status = 409, description = "Question not accepting answers or player already answered"),
        (status = 422, description = "Answer does not fit the question type")
    )
)]
pub async fn submit_answer(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Actor(actor): Actor,
    Json(payload): Json<AnswerRequest>,
) -> Result<Json<GameResponse>, AppError> {
    Ok(Json(
        play_service::submit_answer(&state, id, actor, payload).await?,
    ))
}

/// Reveal the next clue of a progressive-clues question.
#[utoipa::path(
    post,
    path = "/games/{id}/question/clue",
    tag = "play",
    params(
        ("id" = Uuid, Path, description = "Game identifier"),
        ("X-User-Id" = Uuid, Header, description = "Organizer")
    ),
    request_body = QuestionActionRequest,
    responses(
        (status = 200, description = "Clue revealed", body = GameResponse),
        (status = 403, description = "Caller is not an organizer"),
        (status = 409, description = "No clue left to reveal")
    )
)]
pub async fn reveal_clue(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Actor(actor): Actor,
    Json(payload): Json<QuestionActionRequest>,
) -> Result<Json<GameResponse>, AppError> {
    Ok(Json(
        play_service::reveal_clue(&state, id, actor, payload).await?,
    ))
}

/// Report that the answer time of the current question ran out.
#[utoipa::path(
    post,
    path = "/games/{id}/question/expire",
    tag = "play",
    params(("id" = Uuid, Path, description = "Game identifier")),
    request_body = QuestionActionRequest,
    responses(
        (status = 200, description = "Question resolved", body = GameResponse),
        (status = 409, description = "Answer time not over yet")
    )
)]
pub async fn expire_question(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<QuestionActionRequest>,
) -> Result<Json<GameResponse>, AppError> {
    Ok(Json(
        play_service::expire_question(&state, id, payload).await?,
    ))
}
