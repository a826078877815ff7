use std::time::SystemTime;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    dao::models::{
        GameEntity, ParticipantEntity, QuestionEntity, RoundEntity, TeamEntity, TeamScoreEntity,
        UserEntity,
    },
    state::{question::Question, round::Round, state_machine::GameStatus},
};

/// Identity and display data of a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Stable identifier, provided by the authentication layer.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Opaque media reference of the avatar.
    pub avatar: Option<String>,
}

/// Per-question status of a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerStatus {
    /// Nothing to report.
    #[default]
    Idle,
    /// Answered the current question correctly.
    Correct,
    /// Answered the current question wrongly.
    Wrong,
    /// Head of the buzz queue, expected to answer.
    Focus,
    /// Ready to start the game.
    Ready,
}

/// Player-specific participant data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerState {
    /// Team the player scores for.
    pub team_id: Uuid,
    /// Per-question status.
    #[serde(default)]
    pub status: PlayerStatus,
    /// Whether the organizer lets the player take part.
    pub authorized: bool,
    /// Individual cumulative score.
    #[serde(default)]
    pub score: i64,
}

/// Role of a participant inside a game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Role {
    /// Runs the game.
    Organizer,
    /// Watches without playing.
    Spectator,
    /// Plays and scores.
    Player(PlayerState),
}

/// A user taking part in a game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    /// Display data.
    pub user: User,
    /// Role in the game.
    pub role: Role,
    /// When the user first joined.
    pub joined_at: SystemTime,
}

impl Participant {
    /// Player data, if the participant plays.
    pub fn player(&self) -> Option<&PlayerState> {
        match &self.role {
            Role::Player(player) => Some(player),
            _ => None,
        }
    }

    /// Mutable player data, if the participant plays.
    pub fn player_mut(&mut self) -> Option<&mut PlayerState> {
        match &mut self.role {
            Role::Player(player) => Some(player),
            _ => None,
        }
    }

    /// Whether the participant runs the game.
    pub fn is_organizer(&self) -> bool {
        matches!(self.role, Role::Organizer)
    }
}

/// Scoring unit grouping players.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Team {
    /// Stable identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
}

/// Aggregate holding the whole state of a game session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Game {
    /// Primary key of the game.
    pub id: Uuid,
    /// Display title.
    pub title: String,
    /// Current status.
    pub status: GameStatus,
    /// Status to return to when leaving `special`.
    pub status_before_special: Option<GameStatus>,
    /// Ordered rounds.
    pub rounds: Vec<Round>,
    /// Participants keyed by user id, in join order.
    pub participants: IndexMap<Uuid, Participant>,
    /// Teams keyed by id, in creation order.
    pub teams: IndexMap<Uuid, Team>,
    /// Index of the round being played.
    pub current_round: Option<usize>,
    /// Index of the question being played inside the current round.
    pub current_question: Option<usize>,
    /// Optimistic concurrency revision, bumped on every committed write.
    pub version: u64,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// Last committed write.
    pub updated_at: SystemTime,
}

impl Game {
    /// Build a game in `build` status with the organizer registered.
    pub fn new(title: String, organizer: User, rounds: Vec<Round>, now: SystemTime) -> Self {
        let mut participants = IndexMap::new();
        participants.insert(
            organizer.id,
            Participant {
                user: organizer,
                role: Role::Organizer,
                joined_at: now,
            },
        );

        Self {
            id: Uuid::new_v4(),
            title,
            status: GameStatus::Build,
            status_before_special: None,
            rounds,
            participants,
            teams: IndexMap::new(),
            current_round: None,
            current_question: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Round being played.
    pub fn current_round(&self) -> Option<&Round> {
        self.current_round.and_then(|index| self.rounds.get(index))
    }

    /// Question being played.
    pub fn current_question(&self) -> Option<&Question> {
        let round = self.current_round()?;
        self.current_question
            .and_then(|index| round.questions.get(index))
    }

    /// Player data of a participant.
    pub fn player(&self, user_id: Uuid) -> Option<&PlayerState> {
        self.participants.get(&user_id).and_then(Participant::player)
    }

    /// Mutable player data of a participant.
    pub fn player_mut(&mut self, user_id: Uuid) -> Option<&mut PlayerState> {
        self.participants
            .get_mut(&user_id)
            .and_then(Participant::player_mut)
    }

    /// Ids of the players allowed to play, in join order.
    pub fn authorized_players(&self) -> Vec<Uuid> {
        self.participants
            .iter()
            .filter(|(_, participant)| participant.player().is_some_and(|p| p.authorized))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Number of organizers.
    pub fn organizer_count(&self) -> usize {
        self.participants
            .values()
            .filter(|participant| participant.is_organizer())
            .count()
    }

    /// Round and question indices of a question, wherever it sits in the game.
    pub fn locate_question(&self, question_id: Uuid) -> Option<(usize, usize)> {
        self.rounds.iter().enumerate().find_map(|(round_index, round)| {
            round
                .question_index(question_id)
                .map(|question_index| (round_index, question_index))
        })
    }

    /// Set every player status back to idle.
    pub fn reset_player_statuses(&mut self) {
        for participant in self.participants.values_mut() {
            if let Some(player) = participant.player_mut() {
                player.status = PlayerStatus::Idle;
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn fixture() -> Self {
        let organizer = User {
            id: Uuid::new_v4(),
            name: "Host".into(),
            avatar: None,
        };
        Self::new("Fixture".into(), organizer, Vec::new(), SystemTime::UNIX_EPOCH)
    }
}

impl From<UserEntity> for User {
    fn from(value: UserEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            avatar: value.avatar,
        }
    }
}

impl From<User> for UserEntity {
    fn from(value: User) -> Self {
        Self {
            id: value.id,
            name: value.name,
            avatar: value.avatar,
        }
    }
}

impl From<QuestionEntity> for Question {
    fn from(value: QuestionEntity) -> Self {
        Self {
            id: value.id,
            prompt: value.prompt,
            media: value.media,
            points: value.points,
            spec: value.spec,
            runtime: value.runtime,
        }
    }
}

impl From<Question> for QuestionEntity {
    fn from(value: Question) -> Self {
        Self {
            id: value.id,
            prompt: value.prompt,
            media: value.media,
            points: value.points,
            spec: value.spec,
            runtime: value.runtime,
        }
    }
}

impl From<RoundEntity> for Round {
    fn from(value: RoundEntity) -> Self {
        let mut round = Round::new(
            value.id,
            value.title,
            value.kind,
            value.settings,
            value.questions.into_iter().map(Into::into).collect(),
        );
        round.max_points = value.max_points;
        round.scores = value
            .scores
            .into_iter()
            .map(|score| (score.team_id, score.points))
            .collect();
        round.started_at = value.started_at;
        round.ended_at = value.ended_at;
        round
    }
}

impl From<Round> for RoundEntity {
    fn from(value: Round) -> Self {
        let kind = value.kind();
        Self {
            id: value.id,
            title: value.title,
            kind,
            settings: value.settings,
            questions: value.questions.into_iter().map(Into::into).collect(),
            max_points: value.max_points,
            scores: value
                .scores
                .into_iter()
                .map(|(team_id, points)| TeamScoreEntity { team_id, points })
                .collect(),
            started_at: value.started_at,
            ended_at: value.ended_at,
        }
    }
}

impl From<GameEntity> for Game {
    fn from(value: GameEntity) -> Self {
        Self {
            id: value.id,
            title: value.title,
            status: value.status,
            status_before_special: value.status_before_special,
            rounds: value.rounds.into_iter().map(Into::into).collect(),
            participants: value
                .participants
                .into_iter()
                .map(|participant| {
                    let user: User = participant.user.into();
                    (
                        user.id,
                        Participant {
                            user,
                            role: participant.role,
                            joined_at: participant.joined_at,
                        },
                    )
                })
                .collect(),
            teams: value
                .teams
                .into_iter()
                .map(|team| {
                    (
                        team.id,
                        Team {
                            id: team.id,
                            name: team.name,
                        },
                    )
                })
                .collect(),
            current_round: value.current_round,
            current_question: value.current_question,
            version: value.version,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

impl From<Game> for GameEntity {
    fn from(value: Game) -> Self {
        Self {
            id: value.id,
            title: value.title,
            status: value.status,
            status_before_special: value.status_before_special,
            rounds: value.rounds.into_iter().map(Into::into).collect(),
            participants: value
                .participants
                .into_values()
                .map(|participant| ParticipantEntity {
                    user: participant.user.into(),
                    role: participant.role,
                    joined_at: participant.joined_at,
                })
                .collect(),
            teams: value
                .teams
                .into_values()
                .map(|team| TeamEntity {
                    id: team.id,
                    name: team.name,
                })
                .collect(),
            current_round: value.current_round,
            current_question: value.current_question,
            version: value.version,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{
        question::{QuestionKind, QuestionSpec},
        round::{AnswerMode, RoundSettings},
    };

    #[test]
    fn entity_conversion_preserves_participants_and_scores() {
        let mut game = Game::fixture();
        let team_id = Uuid::new_v4();
        let player_id = Uuid::new_v4();
        game.teams.insert(
            team_id,
            Team {
                id: team_id,
                name: "Blue".into(),
            },
        );
        game.participants.insert(
            player_id,
            Participant {
                user: User {
                    id: player_id,
                    name: "Alice".into(),
                    avatar: Some("avatars/alice.png".into()),
                },
                role: Role::Player(PlayerState {
                    team_id,
                    status: PlayerStatus::Ready,
                    authorized: true,
                    score: 12,
                }),
                joined_at: SystemTime::UNIX_EPOCH,
            },
        );
        let mut round = Round::new(
            Uuid::new_v4(),
            "Warm-up".into(),
            QuestionKind::Basic,
            RoundSettings {
                rewards_per_question: 10,
                rewards_for_bonus: 5,
                bonus_enabled: true,
                mode: AnswerMode::Riddle,
                answer_time_secs: 20,
                clue_penalty: 0,
                team_scoring: true,
            },
            vec![Question::new(
                Uuid::new_v4(),
                "2 + 2?".into(),
                None,
                None,
                QuestionSpec::Basic {
                    answers: vec!["4".into()],
                },
            )],
        );
        round.refresh_max_points();
        round.credit_team(team_id, 10);
        game.rounds.push(round);

        let entity: GameEntity = game.clone().into();
        assert_eq!(entity.participants.len(), 2);
        assert_eq!(entity.rounds[0].scores[0].points, 10);

        let restored: Game = entity.into();
        assert_eq!(restored, game);
    }

    #[test]
    fn authorized_players_skip_spectators_and_banned_players() {
        let mut game = Game::fixture();
        let team_id = Uuid::new_v4();
        let add = |game: &mut Game, role: Role| {
            let id = Uuid::new_v4();
            game.participants.insert(
                id,
                Participant {
                    user: User {
                        id,
                        name: id.to_string(),
                        avatar: None,
                    },
                    role,
                    joined_at: SystemTime::UNIX_EPOCH,
                },
            );
            id
        };
        let player = |authorized| {
            Role::Player(PlayerState {
                team_id,
                status: PlayerStatus::Idle,
                authorized,
                score: 0,
            })
        };

        let allowed = add(&mut game, player(true));
        add(&mut game, player(false));
        add(&mut game, Role::Spectator);

        assert_eq!(game.authorized_players(), vec![allowed]);
        assert_eq!(game.organizer_count(), 1);
    }
}
