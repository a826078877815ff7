use std::{collections::HashSet, time::SystemTime};

use tracing::info;
use uuid::Uuid;

use crate::{
    dao::{
        game_store::GameStore,
        models::{GameEntity, UserEntity},
        transaction::with_game_transaction,
    },
    dto::game::{
        CreateGameRequest, GameResponse, JoinGameRequest, RoundInput, RoundSettingsInput,
        ScoreboardResponse,
    },
    error::ServiceError,
    services::sse_events,
    state::{
        SharedState,
        game::{Game, Participant},
        question::{Question, QuestionRuntime},
        round::Round,
        state_machine::GameStatus,
    },
};

/// Run a game mutation in an optimistic transaction and broadcast the result when it
/// committed a new version.
pub(crate) async fn run_game_transaction<T, F>(
    state: &SharedState,
    game_id: Uuid,
    mut mutate: F,
) -> Result<(Game, T), ServiceError>
where
    F: FnMut(&mut Game, SystemTime) -> Result<T, ServiceError>,
{
    let store = state.require_game_store().await?;
    let mut read_version = None;
    let (game, output) = with_game_transaction(
        store.as_ref(),
        &state.config().transaction,
        game_id,
        |game| {
            read_version = Some(game.version);
            mutate(game, SystemTime::now())
        },
    )
    .await?;

    if read_version != Some(game.version) {
        sse_events::broadcast_game_state(state, &game);
    }
    Ok((game, output))
}

async fn load_game(state: &SharedState, game_id: Uuid) -> Result<Game, ServiceError> {
    let store = state.require_game_store().await?;
    store
        .find_game(game_id)
        .await?
        .map(Game::from)
        .ok_or_else(|| ServiceError::NotFound(format!("game {game_id}")))
}

/// Validate a game definition, resolve its bank questions and persist it in `build`.
pub async fn create_game(
    state: &SharedState,
    actor: Uuid,
    request: CreateGameRequest,
) -> Result<GameResponse, ServiceError> {
    let store = state.require_game_store().await?;
    let CreateGameRequest {
        title,
        organizer,
        rounds,
    } = request;

    let title = title.trim().to_owned();
    if title.is_empty() {
        return Err(ServiceError::Validation("game title must not be empty".into()));
    }
    if rounds.is_empty() {
        return Err(ServiceError::Validation(
            "a game requires at least one round".into(),
        ));
    }

    let default_answer_time = state.config().game.default_answer_time_secs;
    let mut built = Vec::with_capacity(rounds.len());
    for input in rounds {
        built.push(build_round(store.as_ref(), input, default_answer_time).await?);
    }
    ensure_unique_question_ids(&built)?;

    let organizer = organizer.into_user(actor);
    store.save_user(UserEntity::from(organizer.clone())).await?;

    let game = Game::new(title, organizer, built, SystemTime::now());
    store.insert_game(GameEntity::from(game.clone())).await?;
    info!(game_id = %game.id, rounds = game.rounds.len(), "game created");

    Ok(GameResponse::from(&game))
}

async fn build_round(
    store: &dyn GameStore,
    input: RoundInput,
    default_answer_time: u32,
) -> Result<Round, ServiceError> {
    let RoundInput {
        title,
        kind,
        settings,
        questions: inline,
        question_ids,
    } = input;

    let mut questions = inline
        .into_iter()
        .map(|question| question.into_question().map_err(ServiceError::Validation))
        .collect::<Result<Vec<Question>, _>>()?;

    for id in question_ids {
        let entity = store
            .find_question(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("bank question {id}")))?;
        let mut question = Question::from(entity);
        question.runtime = QuestionRuntime::default();
        questions.push(question);
    }

    let mut round = Round::new(
        Uuid::new_v4(),
        title.trim().to_owned(),
        kind,
        settings.into_settings(default_answer_time),
        questions,
    );
    round.validate().map_err(ServiceError::Validation)?;
    round.refresh_max_points();
    Ok(round)
}

fn ensure_unique_question_ids(rounds: &[Round]) -> Result<(), ServiceError> {
    let mut seen = HashSet::new();
    for question in rounds.iter().flat_map(|round| round.questions.iter()) {
        if !seen.insert(question.id) {
            return Err(ServiceError::Validation(format!(
                "question {} appears more than once",
                question.id
            )));
        }
    }
    Ok(())
}

/// Canonical state of a game.
pub async fn get_game(state: &SharedState, game_id: Uuid) -> Result<GameResponse, ServiceError> {
    let game = load_game(state, game_id).await?;
    Ok(GameResponse::from(&game))
}

/// Team totals, per-round completion and player ranking.
pub async fn get_scoreboard(
    state: &SharedState,
    game_id: Uuid,
) -> Result<ScoreboardResponse, ServiceError> {
    let game = load_game(state, game_id).await?;
    Ok(ScoreboardResponse::new(game.id, game.scoreboard()))
}

/// Register the caller, or refresh their display data when they already joined.
pub async fn join_game(
    state: &SharedState,
    game_id: Uuid,
    actor: Uuid,
    request: JoinGameRequest,
) -> Result<GameResponse, ServiceError> {
    let join_as = request.join_as();
    let user = request.user.into_user(actor);

    let (game, ()) = run_game_transaction(state, game_id, |game, now| {
        game.join(user.clone(), join_as.clone(), now)
            .map_err(Into::into)
    })
    .await?;

    let store = state.require_game_store().await?;
    store.save_user(UserEntity::from(user)).await?;
    info!(%game_id, user_id = %actor, "participant joined");
    Ok(GameResponse::from(&game))
}

/// Remove a participant. Participants leave on their own; organizers may remove anyone.
pub async fn leave_game(
    state: &SharedState,
    game_id: Uuid,
    actor: Uuid,
    user_id: Uuid,
) -> Result<GameResponse, ServiceError> {
    let (game, ()) = run_game_transaction(state, game_id, |game, now| {
        let allowed = actor == user_id
            || game
                .participants
                .get(&actor)
                .is_some_and(Participant::is_organizer);
        if !allowed {
            return Err(ServiceError::Unauthorized(
                "only organizers can remove other participants".into(),
            ));
        }
        game.leave(user_id, now).map_err(Into::into)
    })
    .await?;
    info!(%game_id, %user_id, "participant left");
    Ok(GameResponse::from(&game))
}

/// Flag a player as ready.
pub async fn set_player_ready(
    state: &SharedState,
    game_id: Uuid,
    actor: Uuid,
    player_id: Uuid,
) -> Result<GameResponse, ServiceError> {
    let (game, ()) = run_game_transaction(state, game_id, |game, _| {
        game.set_player_ready(actor, player_id).map_err(Into::into)
    })
    .await?;
    Ok(GameResponse::from(&game))
}

/// Let a player take part, or bench them.
pub async fn toggle_player_authorization(
    state: &SharedState,
    game_id: Uuid,
    actor: Uuid,
    player_id: Uuid,
) -> Result<GameResponse, ServiceError> {
    let (game, authorized) = run_game_transaction(state, game_id, |game, now| {
        game.toggle_player_authorization(actor, player_id, now)
            .map_err(Into::into)
    })
    .await?;
    info!(%game_id, %player_id, authorized, "player authorization changed");
    Ok(GameResponse::from(&game))
}

/// Move the game to another status.
pub async fn advance(
    state: &SharedState,
    game_id: Uuid,
    actor: Uuid,
    to: GameStatus,
) -> Result<GameResponse, ServiceError> {
    let (game, status) = run_game_transaction(state, game_id, |game, now| {
        game.advance(actor, to, now).map_err(Into::into)
    })
    .await?;
    info!(%game_id, ?status, "game status changed");
    Ok(GameResponse::from(&game))
}

/// Replace the settings of a round while building the game.
pub async fn update_round_settings(
    state: &SharedState,
    game_id: Uuid,
    actor: Uuid,
    round_id: Uuid,
    input: RoundSettingsInput,
) -> Result<GameResponse, ServiceError> {
    let settings = input.into_settings(state.config().game.default_answer_time_secs);
    let (game, max_points) = run_game_transaction(state, game_id, |game, _| {
        game.update_round_settings(actor, round_id, settings.clone())
            .map_err(Into::into)
    })
    .await?;
    info!(%game_id, %round_id, max_points, "round settings updated");
    Ok(GameResponse::from(&game))
}
