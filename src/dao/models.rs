use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

use crate::state::{
    game::Role,
    question::{QuestionKind, QuestionRuntime, QuestionSpec},
    round::RoundSettings,
    state_machine::GameStatus,
};

/// User document, upserted whenever the user joins a game.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserEntity {
    /// Stable identifier provided by the authentication layer.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Opaque media reference of the avatar.
    pub avatar: Option<String>,
}

/// Question document. Bank questions carry an idle runtime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionEntity {
    /// Stable identifier.
    pub id: Uuid,
    /// Text shown to players.
    pub prompt: String,
    /// Opaque media reference.
    pub media: Option<String>,
    /// Per-question reward override.
    pub points: Option<u32>,
    /// Correct-answer specification, tagged by question type.
    pub spec: QuestionSpec,
    /// Runtime state while played.
    #[serde(default)]
    pub runtime: QuestionRuntime,
}

impl QuestionEntity {
    /// Question type tag.
    pub fn kind(&self) -> QuestionKind {
        self.spec.kind()
    }
}

/// Team score line of a round.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TeamScoreEntity {
    /// Team identifier.
    pub team_id: Uuid,
    /// Points scored in the round.
    pub points: i64,
}

/// Round embedded in a game document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoundEntity {
    /// Stable identifier.
    pub id: Uuid,
    /// Display title.
    pub title: String,
    /// Question type shared by the round.
    pub kind: QuestionKind,
    /// Scoring rules.
    pub settings: RoundSettings,
    /// Ordered questions.
    pub questions: Vec<QuestionEntity>,
    /// Highest reachable score.
    pub max_points: Option<u32>,
    /// Score per team, in team creation order.
    #[serde(default)]
    pub scores: Vec<TeamScoreEntity>,
    /// Start timestamp.
    pub started_at: Option<SystemTime>,
    /// End timestamp.
    pub ended_at: Option<SystemTime>,
}

/// Participant embedded in a game document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParticipantEntity {
    /// Display data, copied from the user document at join time.
    pub user: UserEntity,
    /// Role in the game.
    pub role: Role,
    /// When the user first joined.
    pub joined_at: SystemTime,
}

/// Team embedded in a game document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TeamEntity {
    /// Stable identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
}

/// Aggregate game entity persisted by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameEntity {
    /// Primary key of the game.
    pub id: Uuid,
    /// Display title.
    pub title: String,
    /// Current status.
    pub status: GameStatus,
    /// Status to return to when leaving `special`.
    pub status_before_special: Option<GameStatus>,
    /// Ordered rounds.
    pub rounds: Vec<RoundEntity>,
    /// Participants in join order.
    pub participants: Vec<ParticipantEntity>,
    /// Teams in creation order.
    pub teams: Vec<TeamEntity>,
    /// Index of the round being played.
    pub current_round: Option<usize>,
    /// Index of the question being played.
    pub current_question: Option<usize>,
    /// Optimistic concurrency revision.
    pub version: u64,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// Last time the game entity was updated.
    pub updated_at: SystemTime,
}
