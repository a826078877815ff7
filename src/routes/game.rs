use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::game::{
        AdvanceRequest, CreateGameRequest, GameResponse, JoinGameRequest, RoundSettingsInput,
        ScoreboardResponse,
    },
    error::AppError,
    routes::Actor,
    services::game_service,
    state::SharedState,
};

/// Routes building a game and driving its lifecycle.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/games", post(create_game))
        .route("/games/{id}", get(get_game))
        .route("/games/{id}/scoreboard", get(get_scoreboard))
        .route("/games/{id}/participants", post(join_game))
        .route("/games/{id}/participants/{user_id}", delete(leave_game))
        .route("/games/{id}/players/{player_id}/ready", post(set_player_ready))
        .route(
            "/games/{id}/players/{player_id}/authorization",
            post(toggle_player_authorization),
        )
        .route("/games/{id}/status", post(advance))
        .route(
            "/games/{id}/rounds/{round_id}/settings",
            put(update_round_settings),
        )
}

/// Create a game owned by the caller.
#[utoipa::path(
    post,
    path = "/games",
    tag = "game",
    params(("X-User-Id" = Uuid, Header, description = "Caller, registered as organizer")),
    request_body = CreateGameRequest,
    responses(
        (status = 201, description = "Game created", body = GameResponse),
        (status = 400, description = "Invalid game definition"),
        (status = 404, description = "Unknown bank question")
    )
)]
pub async fn create_game(
    State(state): State<SharedState>,
    Actor(actor): Actor,
    Valid(Json(payload)): Valid<Json<CreateGameRequest>>,
) -> Result<(StatusCode, Json<GameResponse>), AppError> {
    let game = game_service::create_game(&state, actor, payload).await?;
    Ok((StatusCode::CREATED, Json(game)))
}

/// Current state of a game.
#[utoipa::path(
    get,
    path = "/games/{id}",
    tag = "game",
    params(("id" = Uuid, Path, description = "Game identifier")),
    responses(
        (status = 200, description = "Game state", body = GameResponse),
        (status = 404, description = "Unknown game")
    )
)]
pub async fn get_game(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<GameResponse>, AppError> {
    Ok(Json(game_service::get_game(&state, id).await?))
}

/// Team totals, round completion and player ranking.
#[utoipa::path(
    get,
    path = "/games/{id}/scoreboard",
    tag = "game",
    params(("id" = Uuid, Path, description = "Game identifier")),
    responses(
        (status = 200, description = "Scoreboard", body = ScoreboardResponse),
        (status = 404, description = "Unknown game")
    )
)]
pub async fn get_scoreboard(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ScoreboardResponse>, AppError> {
    Ok(Json(game_service::get_scoreboard(&state, id).await?))
}

/// Join a game as the caller.
#[utoipa::path(
    post,
    path = "/games/{id}/participants",
    tag = "game",
    params(
        ("id" = Uuid, Path, description = "Game identifier"),
        ("X-User-Id" = Uuid, Header, description = "Joining user")
    ),
    request_body = JoinGameRequest,
    responses(
        (status = 200, description = "Participant registered", body = GameResponse),
        (status = 404, description = "Unknown game or team"),
        (status = 409, description = "Game is over")
    )
)]
pub async fn join_game(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Actor(actor): Actor,
    Valid(Json(payload)): Valid<Json<JoinGameRequest>>,
) -> Result<Json<GameResponse>, AppError> {
    Ok(Json(
        game_service::join_game(&state, id, actor, payload).await?,
    ))
}

/// Leave a game, or remove a participant as organizer.
#[utoipa::path(
    delete,
    path = "/games/{id}/participants/{user_id}",
    tag = "game",
    params(
        ("id" = Uuid, Path, description = "Game identifier"),
        ("user_id" = Uuid, Path, description = "Participant to remove"),
        ("X-User-Id" = Uuid, Header, description = "Caller")
    ),
    responses(
        (status = 200, description = "Participant removed", body = GameResponse),
        (status = 403, description = "Caller may not remove this participant"),
        (status = 409, description = "Last organizer cannot leave")
    )
)]
pub async fn leave_game(
    State(state): State<SharedState>,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
    Actor(actor): Actor,
) -> Result<Json<GameResponse>, AppError> {
    Ok(Json(
        game_service::leave_game(&state, id, actor, user_id).await?,
    ))
}

/// Flag a player as ready.
#[utoipa::path(
    post,
    path = "/games/{id}/players/{player_id}/ready",
    tag = "game",
    params(
        ("id" = Uuid, Path, description = "Game identifier"),
        ("player_id" = Uuid, Path, description = "Player getting ready"),
        ("X-User-Id" = Uuid, Header, description = "The player or an organizer")
    ),
    responses(
        (status = 200, description = "Player ready", body = GameResponse),
        (status = 409, description = "Readiness cannot change now")
    )
)]
pub async fn set_player_ready(
    State(state): State<SharedState>,
    Path((id, player_id)): Path<(Uuid, Uuid)>,
    Actor(actor): Actor,
) -> Result<Json<GameResponse>, AppError> {
    Ok(Json(
        game_service::set_player_ready(&state, id, actor, player_id).await?,
    ))
}

/// Toggle whether a player may play.
#[utoipa::path(
    post,
    path = "/games/{id}/players/{player_id}/authorization",
    tag = "game",
    params(
        ("id" = Uuid, Path, description = "Game identifier"),
        ("player_id" = Uuid, Path, description = "Player to toggle"),
        ("X-User-Id" = Uuid, Header, description = "Organizer")
    ),
    responses(
        (status = 200, description = "Authorization toggled", body = GameResponse),
        (status = 403, description = "Caller is not an organizer")
    )
)]
pub async fn toggle_player_authorization(
    State(state): State<SharedState>,
    Path((id, player_id)): Path<(Uuid, Uuid)>,
    Actor(actor): Actor,
) -> Result<Json<GameResponse>, AppError> {
    Ok(Json(
        game_service::toggle_player_authorization(&state, id, actor, player_id).await?,
    ))
}

/// Move the game to another status.
#[utoipa::path(
    post,
    path = "/games/{id}/status",
    tag = "game",
    params(
        ("id" = Uuid, Path, description = "Game identifier"),
        ("X-User-Id" = Uuid, Header, description = "Organizer")
    ),
    request_body = AdvanceRequest,
    responses(
        (status = 200, description = "Status changed", body = GameResponse),
        (status = 403, description = "Caller is not an organizer"),
        (status = 409, description = "Transition not allowed")
    )
)]
pub async fn advance(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Actor(actor): Actor,
    Json(payload): Json<AdvanceRequest>,
) -> Result<Json<GameResponse>, AppError> {
    Ok(Json(
        game_service::advance(&state, id, actor, payload.status).await?,
    ))
}

/// Replace the settings of a round while the game is being built.
#[utoipa::path(
    put,
    path = "/games/{id}/rounds/{round_id}/settings",
    tag = "game",
    params(
        ("id" = Uuid, Path, description = "Game identifier"),
        ("round_id" = Uuid, Path, description = "Round identifier"),
        ("X-User-Id" = Uuid, Header, description = "Organizer")
    ),
    request_body = RoundSettingsInput,
    responses(
        (status = 200, description = "Settings updated", body = GameResponse),
        (status = 400, description = "Settings do not fit the round"),
        (status = 409, description = "Game already started")
    )
)]
pub async fn update_round_settings(
    State(state): State<SharedState>,
    Path((id, round_id)): Path<(Uuid, Uuid)>,
    Actor(actor): Actor,
    Valid(Json(payload)): Valid<Json<RoundSettingsInput>>,
) -> Result<Json<GameResponse>, AppError> {
    Ok(Json(
        game_service::update_round_settings(&state, id, actor, round_id, payload).await?,
    ))
}
