use uuid::Uuid;

use crate::state::game::Game;

/// Aggregated scores of a game.
#[derive(Debug, Clone, PartialEq)]
pub struct Scoreboard {
    /// Teams ranked by total score, best first.
    pub teams: Vec<TeamStanding>,
    /// Per-round results.
    pub rounds: Vec<RoundStanding>,
    /// Players ranked by individual score, best first.
    pub players: Vec<PlayerStanding>,
}

/// Total of a team over every round.
#[derive(Debug, Clone, PartialEq)]
pub struct TeamStanding {
    /// Team identifier.
    pub team_id: Uuid,
    /// Team name.
    pub name: String,
    /// Sum of the team's round scores.
    pub total: i64,
}

/// Results of one round.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundStanding {
    /// Round identifier.
    pub round_id: Uuid,
    /// Round title.
    pub title: String,
    /// Highest reachable score.
    pub max_points: u32,
    /// Score of every team in the round.
    pub scores: Vec<RoundScore>,
}

/// Score of a team in one round.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundScore {
    /// Team identifier.
    pub team_id: Uuid,
    /// Points scored.
    pub points: i64,
    /// `points / max_points`, absent for rounds worth nothing.
    pub completion: Option<f64>,
}

/// Individual score of a player.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerStanding {
    /// Player identifier.
    pub player_id: Uuid,
    /// Display name.
    pub name: String,
    /// Team the player scores for.
    pub team_id: Uuid,
    /// Cumulative score.
    pub score: i64,
}

impl Game {
    /// Compute the scoreboard from the committed scores.
    pub fn scoreboard(&self) -> Scoreboard {
        let rounds: Vec<RoundStanding> = self
            .rounds
            .iter()
            .map(|round| {
                let max_points = round
                    .max_points
                    .unwrap_or_else(|| round.calculate_max_points());
                RoundStanding {
                    round_id: round.id,
                    title: round.title.clone(),
                    max_points,
                    scores: round
                        .scores
                        .iter()
                        .map(|(team_id, points)| RoundScore {
                            team_id: *team_id,
                            points: *points,
                            completion: (max_points > 0)
                                .then(|| *points as f64 / f64::from(max_points)),
                        })
                        .collect(),
                }
            })
            .collect();

        let mut teams: Vec<TeamStanding> = self
            .teams
            .values()
            .map(|team| TeamStanding {
                team_id: team.id,
                name: team.name.clone(),
                total: self
                    .rounds
                    .iter()
                    .filter_map(|round| round.scores.get(&team.id))
                    .sum(),
            })
            .collect();
        teams.sort_by(|a, b| b.total.cmp(&a.total));

        let mut players: Vec<PlayerStanding> = self
            .participants
            .iter()
            .filter_map(|(id, participant)| {
                participant.player().map(|player| PlayerStanding {
                    player_id: *id,
                    name: participant.user.name.clone(),
                    team_id: player.team_id,
                    score: player.score,
                })
            })
            .collect();
        players.sort_by(|a, b| b.score.cmp(&a.score));

        Scoreboard {
            teams,
            rounds,
            players,
        }
    }
}
