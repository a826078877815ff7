use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::question::{BankQuestionResponse, QuestionInput},
    error::AppError,
    services::question_service,
    state::SharedState,
};

/// Question bank routes.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/questions", post(save_question))
        .route("/questions/{id}", get(get_question))
}

/// Save a reusable question.
#[utoipa::path(
    post,
    path = "/questions",
    tag = "questions",
    request_body = QuestionInput,
    responses(
        (status = 201, description = "Question saved", body = BankQuestionResponse),
        (status = 400, description = "Inconsistent question")
    )
)]
pub async fn save_question(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<QuestionInput>>,
) -> Result<(StatusCode, Json<BankQuestionResponse>), AppError> {
    let question = question_service::save_question(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(question)))
}

/// Fetch a bank question with its solution.
#[utoipa::path(
    get,
    path = "/questions/{id}",
    tag = "questions",
    params(("id" = Uuid, Path, description = "Question identifier")),
    responses(
        (status = 200, description = "Question", body = BankQuestionResponse),
        (status = 404, description = "Unknown question")
    )
)]
pub async fn get_question(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<BankQuestionResponse>, AppError> {
    Ok(Json(question_service::get_question(&state, id).await?))
}
