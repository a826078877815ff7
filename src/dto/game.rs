use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{
        format_system_time,
        question::{QuestionInput, QuestionView},
        validation::{validate_media_reference, validate_not_blank},
    },
    state::{
        engine::JoinAs,
        game::{Game, Participant, Role, User},
        question::{Answer, QuestionKind},
        round::{AnswerMode, Round, RoundSettings},
        scoreboard::Scoreboard,
        state_machine::GameStatus,
    },
};

/// Display data of the calling user.
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct UserInput {
    #[validate(length(max = 64), custom(function = "validate_not_blank"))]
    pub name: String,
    #[serde(default)]
    #[validate(custom(function = "validate_media_reference"))]
    pub avatar: Option<String>,
}

impl UserInput {
    /// Attach the caller id.
    pub fn into_user(self, id: Uuid) -> User {
        User {
            id,
            name: self.name.trim().to_owned(),
            avatar: self.avatar,
        }
    }
}

/// Payload used to create a game. The caller becomes its organizer.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateGameRequest {
    #[validate(length(max = 200), custom(function = "validate_not_blank"))]
    pub title: String,
    #[validate(nested)]
    pub organizer: UserInput,
    /// Played in order; an empty list is rejected when the game is built.
    #[validate(nested)]
    pub rounds: Vec<RoundInput>,
}

/// Round definition mixing inline questions and bank references.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct RoundInput {
    #[validate(length(max = 200), custom(function = "validate_not_blank"))]
    pub title: String,
    #[schema(value_type = String)]
    pub kind: QuestionKind,
    #[validate(nested)]
    pub settings: RoundSettingsInput,
    /// Inline questions, played first.
    #[serde(default)]
    #[validate(nested)]
    pub questions: Vec<QuestionInput>,
    /// Bank questions, played after the inline ones in the given order.
    #[serde(default)]
    pub question_ids: Vec<Uuid>,
}

/// Scoring and timing rules of a round.
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct RoundSettingsInput {
    #[validate(range(max = 10_000))]
    pub rewards_per_question: u32,
    #[serde(default)]
    #[validate(range(max = 10_000))]
    pub rewards_for_bonus: u32,
    #[serde(default)]
    pub bonus_enabled: bool,
    #[serde(default)]
    #[schema(value_type = String)]
    pub mode: AnswerMode,
    /// Defaults to the server configuration.
    #[serde(default)]
    #[validate(range(min = 1, max = 3600))]
    pub answer_time_secs: Option<u32>,
    #[serde(default)]
    #[validate(range(max = 10_000))]
    pub clue_penalty: u32,
    #[serde(default)]
    pub team_scoring: Option<bool>,
}

impl RoundSettingsInput {
    /// Resolve defaults.
    pub fn into_settings(self, default_answer_time_secs: u32) -> RoundSettings {
        RoundSettings {
            rewards_per_question: self.rewards_per_question,
            rewards_for_bonus: self.rewards_for_bonus,
            bonus_enabled: self.bonus_enabled,
            mode: self.mode,
            answer_time_secs: self.answer_time_secs.unwrap_or(default_answer_time_secs),
            clue_penalty: self.clue_penalty,
            team_scoring: self.team_scoring.unwrap_or(true),
        }
    }
}

/// Role requested when joining.
#[derive(Debug, Clone, Copy, Default, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum JoinRole {
    #[default]
    Player,
    Spectator,
}

/// Payload used to join a game as the calling user.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct JoinGameRequest {
    #[validate(nested)]
    pub user: UserInput,
    #[serde(default)]
    pub role: JoinRole,
    /// Existing team to join.
    #[serde(default)]
    pub team_id: Option<Uuid>,
    /// Team to join or create by name.
    #[serde(default)]
    #[validate(length(max = 64))]
    pub team_name: Option<String>,
}

impl JoinGameRequest {
    /// Role and team choice understood by the game.
    pub fn join_as(&self) -> JoinAs {
        match self.role {
            JoinRole::Spectator => JoinAs::Spectator,
            JoinRole::Player => JoinAs::Player {
                team_id: self.team_id,
                team_name: self.team_name.clone(),
            },
        }
    }
}

/// Target status of an organizer transition.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AdvanceRequest {
    #[schema(value_type = String)]
    pub status: GameStatus,
}

/// Names the question an in-game action targets. Stale ids are ignored.
#[derive(Debug, Deserialize, ToSchema)]
pub struct QuestionActionRequest {
    pub question_id: Uuid,
}

/// Answer submission of the calling player.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AnswerRequest {
    pub question_id: Uuid,
    /// Tagged by `type` with a `value`, e.g. `{"type":"text","value":"Paris"}`.
    #[schema(value_type = Object)]
    pub answer: Answer,
}

/// Canonical game state returned by every game operation.
#[derive(Debug, Serialize, ToSchema)]
pub struct GameResponse {
    pub id: Uuid,
    pub title: String,
    #[schema(value_type = String)]
    pub status: GameStatus,
    #[schema(value_type = Option<String>)]
    pub status_before_special: Option<GameStatus>,
    pub version: u64,
    pub created_at: String,
    pub updated_at: String,
    pub current_round: Option<usize>,
    pub current_question: Option<usize>,
    pub participants: Vec<ParticipantView>,
    pub teams: Vec<TeamView>,
    pub rounds: Vec<RoundView>,
}

/// Participant of a game.
#[derive(Debug, Serialize, ToSchema)]
pub struct ParticipantView {
    pub id: Uuid,
    pub name: String,
    pub avatar: Option<String>,
    /// `{"type":"organizer"}`, `{"type":"spectator"}` or a player with its team, status,
    /// authorization and score.
    #[schema(value_type = Object)]
    pub role: Role,
    pub joined_at: String,
}

/// Team of a game.
#[derive(Debug, Serialize, ToSchema)]
pub struct TeamView {
    pub id: Uuid,
    pub name: String,
}

/// Points of a team in a round.
#[derive(Debug, Serialize, ToSchema)]
pub struct TeamScoreView {
    pub team_id: Uuid,
    pub points: i64,
}

/// Round of a game.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoundView {
    pub id: Uuid,
    pub title: String,
    #[schema(value_type = String)]
    pub kind: QuestionKind,
    #[schema(value_type = Object)]
    pub settings: RoundSettings,
    pub max_points: Option<u32>,
    pub scores: Vec<TeamScoreView>,
    pub started_at: Option<String>,
    pub ended_at: Option<String>,
    pub questions: Vec<QuestionView>,
}

impl GameResponse {
    /// Project a game as seen at `now`.
    pub fn new(game: &Game, now: SystemTime) -> Self {
        Self {
            id: game.id,
            title: game.title.clone(),
            status: game.status,
            status_before_special: game.status_before_special,
            version: game.version,
            created_at: format_system_time(game.created_at),
            updated_at: format_system_time(game.updated_at),
            current_round: game.current_round,
            current_question: game.current_question,
            participants: game
                .participants
                .iter()
                .map(|(id, participant)| ParticipantView::new(*id, participant))
                .collect(),
            teams: game
                .teams
                .values()
                .map(|team| TeamView {
                    id: team.id,
                    name: team.name.clone(),
                })
                .collect(),
            rounds: game
                .rounds
                .iter()
                .map(|round| RoundView::new(round, now))
                .collect(),
        }
    }
}

impl From<&Game> for GameResponse {
    fn from(game: &Game) -> Self {
        Self::new(game, SystemTime::now())
    }
}

impl ParticipantView {
    fn new(id: Uuid, participant: &Participant) -> Self {
        Self {
            id,
            name: participant.user.name.clone(),
            avatar: participant.user.avatar.clone(),
            role: participant.role.clone(),
            joined_at: format_system_time(participant.joined_at),
        }
    }
}

impl RoundView {
    fn new(round: &Round, now: SystemTime) -> Self {
        Self {
            id: round.id,
            title: round.title.clone(),
            kind: round.kind(),
            settings: round.settings.clone(),
            max_points: round.max_points,
            scores: round
                .scores
                .iter()
                .map(|(team_id, points)| TeamScoreView {
                    team_id: *team_id,
                    points: *points,
                })
                .collect(),
            started_at: round.started_at.map(format_system_time),
            ended_at: round.ended_at.map(format_system_time),
            questions: round
                .questions
                .iter()
                .map(|question| QuestionView::new(question, now))
                .collect(),
        }
    }
}

/// Aggregated scores of a game.
#[derive(Debug, Serialize, ToSchema)]
pub struct ScoreboardResponse {
    pub game_id: Uuid,
    /// Best team first.
    pub teams: Vec<TeamTotalView>,
    pub rounds: Vec<RoundResultView>,
    /// Best player first.
    pub players: Vec<PlayerScoreView>,
}

/// Total of a team across rounds.
#[derive(Debug, Serialize, ToSchema)]
pub struct TeamTotalView {
    pub team_id: Uuid,
    pub name: String,
    pub total: i64,
}

/// Scores of a round.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoundResultView {
    pub round_id: Uuid,
    pub title: String,
    pub max_points: u32,
    pub scores: Vec<RoundScoreView>,
}

/// Points of a team in a round, with completion.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoundScoreView {
    pub team_id: Uuid,
    pub points: i64,
    /// Share of the max points, absent when the round is worth nothing.
    pub completion: Option<f64>,
}

/// Individual score of a player.
#[derive(Debug, Serialize, ToSchema)]
pub struct PlayerScoreView {
    pub player_id: Uuid,
    pub name: String,
    pub team_id: Uuid,
    pub score: i64,
}

impl ScoreboardResponse {
    /// Attach the game id to a computed scoreboard.
    pub fn new(game_id: Uuid, scoreboard: Scoreboard) -> Self {
        Self {
            game_id,
            teams: scoreboard
                .teams
                .into_iter()
                .map(|team| TeamTotalView {
                    team_id: team.team_id,
                    name: team.name,
                    total: team.total,
                })
                .collect(),
            rounds: scoreboard
                .rounds
                .into_iter()
                .map(|round| RoundResultView {
                    round_id: round.round_id,
                    title: round.title,
                    max_points: round.max_points,
                    scores: round
                        .scores
                        .into_iter()
                        .map(|score| RoundScoreView {
                            team_id: score.team_id,
                            points: score.points,
                            completion: score.completion,
                        })
                        .collect(),
                })
                .collect(),
            players: scoreboard
                .players
                .into_iter()
                .map(|player| PlayerScoreView {
                    player_id: player.player_id,
                    name: player.name,
                    team_id: player.team_id,
                    score: player.score,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_request_requires_a_title() {
        let payload = serde_json::json!({
            "title": "  ",
            "organizer": { "name": "Host" },
            "rounds": []
        });
        let request: CreateGameRequest = serde_json::from_value(payload).unwrap();
        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("title"));
        assert!(!fields.contains_key("rounds"));
    }

    #[test]
    fn settings_fall_back_to_the_configured_answer_time() {
        let input: RoundSettingsInput =
            serde_json::from_value(serde_json::json!({ "rewards_per_question": 10 })).unwrap();
        let settings = input.into_settings(45);
        assert_eq!(settings.answer_time_secs, 45);
        assert!(settings.team_scoring);
        assert_eq!(settings.mode, AnswerMode::Riddle);
    }

    #[test]
    fn join_defaults_to_player_role() {
        let request: JoinGameRequest = serde_json::from_value(serde_json::json!({
            "user": { "name": "Ada" },
            "team_name": "Owls"
        }))
        .unwrap();
        assert_eq!(
            request.join_as(),
            JoinAs::Player {
                team_id: None,
                team_name: Some("Owls".into())
            }
        );
    }

    #[test]
    fn game_response_lists_the_organizer() {
        let game = Game::fixture();
        let response = GameResponse::new(&game, SystemTime::UNIX_EPOCH);
        assert_eq!(response.participants.len(), 1);
        assert!(matches!(response.participants[0].role, Role::Organizer));
        assert_eq!(response.created_at, "1970-01-01T00:00:00Z");
    }
}
