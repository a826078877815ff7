use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Quiz Live Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::game_stream,
        crate::routes::game::create_game,
        crate::routes::game::get_game,
        crate::routes::game::get_scoreboard,
        crate::routes::game::join_game,
        crate::routes::game::leave_game,
        crate::routes::game::set_player_ready,
        crate::routes::game::toggle_player_authorization,
        crate::routes::game::advance,
        crate::routes::game::update_round_settings,
        crate::routes::play::buzz,
        crate::routes::play::submit_answer,
        crate::routes::play::reveal_clue,
        crate::routes::play::expire_question,
        crate::routes::questions::save_question,
        crate::routes::questions::get_question,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::sse::Handshake,
            crate::dto::sse::SystemStatus,
            crate::dto::game::UserInput,
            crate::dto::game::CreateGameRequest,
            crate::dto::game::RoundInput,
            crate::dto::game::RoundSettingsInput,
            crate::dto::game::JoinRole,
            crate::dto::game::JoinGameRequest,
            crate::dto::game::AdvanceRequest,
            crate::dto::game::QuestionActionRequest,
            crate::dto::game::AnswerRequest,
            crate::dto::game::GameResponse,
            crate::dto::game::ParticipantView,
            crate::dto::game::TeamView,
            crate::dto::game::TeamScoreView,
            crate::dto::game::RoundView,
            crate::dto::game::ScoreboardResponse,
            crate::dto::game::TeamTotalView,
            crate::dto::game::RoundResultView,
            crate::dto::game::RoundScoreView,
            crate::dto::game::PlayerScoreView,
            crate::dto::question::QuestionInput,
            crate::dto::question::BankQuestionResponse,
            crate::dto::question::QuestionView,
            crate::dto::question::TimerView,
            crate::dto::question::AnswerView,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "game", description = "Game building, participation and lifecycle"),
        (name = "play", description = "Buzzes, answers and clues on the current question"),
        (name = "questions", description = "Reusable question bank"),
    )
)]
pub struct ApiDoc;
