use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::state::game::Game;

/// Top-level statuses a game goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    /// Organizer is still editing rounds and settings.
    Build,
    /// Lobby: participants join and get ready.
    GameStart,
    /// Everybody is in; the game presentation screen.
    GameHome,
    /// A round has just started.
    RoundStart,
    /// The current question accepts buzzes and answers.
    QuestionActive,
    /// The current question is resolved and its solution shown.
    QuestionEnd,
    /// The current round is over.
    RoundEnd,
    /// Final scoreboard. Terminal.
    GameEnd,
    /// Organizer interruption (pause, technical issue).
    Special,
}

impl GameStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [GameStatus; 9] = [
        GameStatus::Build,
        GameStatus::GameStart,
        GameStatus::GameHome,
        GameStatus::RoundStart,
        GameStatus::QuestionActive,
        GameStatus::QuestionEnd,
        GameStatus::RoundEnd,
        GameStatus::GameEnd,
        GameStatus::Special,
    ];

    /// Statuses from which the organizer may enter [`GameStatus::Special`].
    pub fn is_live(self) -> bool {
        matches!(
            self,
            GameStatus::GameStart
                | GameStatus::GameHome
                | GameStatus::RoundStart
                | GameStatus::QuestionActive
                | GameStatus::QuestionEnd
                | GameStatus::RoundEnd
        )
    }
}

/// Error returned when a requested status change is not an edge of the transition table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("illegal transition: cannot go from {from:?} to {to:?}")]
pub struct IllegalTransition {
    /// Status the game was in.
    pub from: GameStatus,
    /// Status that was requested.
    pub to: GameStatus,
}

/// Errors that can occur when applying a planned transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplyError {
    /// Game status changed since the plan was created.
    #[error("status changed since planning: expected {expected:?}, found {actual:?}")]
    StatusMismatch {
        /// Status when the plan was created.
        expected: GameStatus,
        /// Current status.
        actual: GameStatus,
    },
}

/// A status change validated against the transition table but not applied yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Plan {
    /// Status the game is currently in.
    pub from: GameStatus,
    /// Status the game will move to.
    pub to: GameStatus,
}

/// Validate `to` against the transition table from the game's current status.
pub fn plan(game: &Game, to: GameStatus) -> Result<Plan, IllegalTransition> {
    let to = compute_transition(game.status, to, game.status_before_special)?;
    Ok(Plan {
        from: game.status,
        to,
    })
}

/// Move the game to the planned status once the transition side effects ran. The status
/// must still be the one the plan was made from. Returns the new status.
pub fn apply(game: &mut Game, plan: &Plan) -> Result<GameStatus, ApplyError> {
    if game.status != plan.from {
        return Err(ApplyError::StatusMismatch {
            expected: plan.from,
            actual: game.status,
        });
    }

    if plan.to == GameStatus::Special {
        game.status_before_special = Some(plan.from);
    } else if plan.from == GameStatus::Special {
        game.status_before_special = None;
    }
    game.status = plan.to;

    Ok(game.status)
}

/// Transition table. `resume_to` is the status recorded when entering `special`.
pub fn compute_transition(
    from: GameStatus,
    to: GameStatus,
    resume_to: Option<GameStatus>,
) -> Result<GameStatus, IllegalTransition> {
    use GameStatus::*;

    let allowed = match (from, to) {
        (Build, GameStart)
        | (GameStart, GameHome)
        | (GameHome, RoundStart)
        | (RoundStart, QuestionActive)
        | (QuestionActive, QuestionEnd)
        | (QuestionEnd, QuestionActive)
        | (QuestionEnd, RoundEnd)
        | (RoundEnd, RoundStart)
        | (RoundEnd, GameEnd)
        | (Special, GameEnd) => true,
        (from, Special) => from.is_live(),
        (Special, to) => resume_to == Some(to),
        _ => false,
    };

    if allowed {
        Ok(to)
    } else {
        Err(IllegalTransition { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use GameStatus::*;

    fn expected_edge(from: GameStatus, to: GameStatus, resume_to: GameStatus) -> bool {
        let table = [
            (Build, GameStart),
            (GameStart, GameHome),
            (GameHome, RoundStart),
            (RoundStart, QuestionActive),
            (QuestionActive, QuestionEnd),
            (QuestionEnd, QuestionActive),
            (QuestionEnd, RoundEnd),
            (RoundEnd, RoundStart),
            (RoundEnd, GameEnd),
            (GameStart, Special),
            (GameHome, Special),
            (RoundStart, Special),
            (QuestionActive, Special),
            (QuestionEnd, Special),
            (RoundEnd, Special),
            (Special, GameEnd),
            (Special, resume_to),
        ];
        table.contains(&(from, to))
    }

    #[test]
    fn transition_succeeds_iff_pair_is_an_edge() {
        for resume_to in GameStatus::ALL.into_iter().filter(|s| s.is_live()) {
            for from in GameStatus::ALL {
                for to in GameStatus::ALL {
                    let result = compute_transition(from, to, Some(resume_to));
                    if expected_edge(from, to, resume_to) {
                        assert_eq!(result, Ok(to), "{from:?} -> {to:?}");
                    } else {
                        assert_eq!(
                            result,
                            Err(IllegalTransition { from, to }),
                            "{from:?} -> {to:?}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn game_end_is_terminal() {
        for to in GameStatus::ALL {
            assert!(compute_transition(GameEnd, to, None).is_err());
        }
    }

    #[test]
    fn special_without_recorded_status_only_ends_the_game() {
        for to in GameStatus::ALL {
            let allowed = compute_transition(Special, to, None).is_ok();
            assert_eq!(allowed, to == GameEnd, "{to:?}");
        }
    }

    #[test]
    fn apply_records_and_clears_status_before_special() {
        let mut game = Game::fixture();
        game.status = QuestionActive;

        let pause = plan(&game, Special).unwrap();
        assert_eq!(apply(&mut game, &pause).unwrap(), Special);
        assert_eq!(game.status_before_special, Some(QuestionActive));

        let resume = plan(&game, QuestionActive).unwrap();
        assert_eq!(apply(&mut game, &resume).unwrap(), QuestionActive);
        assert_eq!(game.status_before_special, None);
    }

    #[test]
    fn apply_rejects_a_plan_made_from_another_status() {
        let mut game = Game::fixture();
        let stale = plan(&game, GameStart).unwrap();
        assert_eq!(stale, Plan { from: Build, to: GameStart });

        game.status = GameStart;
        assert_eq!(
            apply(&mut game, &stale),
            Err(ApplyError::StatusMismatch {
                expected: Build,
                actual: GameStart
            })
        );
    }
}
