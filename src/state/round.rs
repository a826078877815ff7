use std::time::SystemTime;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::question::{Question, QuestionKind, Rewards};

/// How players interact with the questions of a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerMode {
    /// Every player answers once, independently.
    #[default]
    Riddle,
    /// Players race to buzz; only the focused player answers.
    Buzzer,
}

/// Groups of question kinds sharing a max points formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoringFamily {
    /// Base reward per question plus an optional first-correct bonus.
    Riddle,
    /// Reward and bonus are both reachable on every question.
    Nagui,
    /// Base reward only, possibly split across partial answers.
    Fixed,
}

impl QuestionKind {
    /// Scoring family of the kind.
    pub fn family(self) -> ScoringFamily {
        match self {
            QuestionKind::Basic
            | QuestionKind::Blindtest
            | QuestionKind::Emoji
            | QuestionKind::Image => ScoringFamily::Riddle,
            QuestionKind::Nagui | QuestionKind::ProgressiveClues | QuestionKind::Enumeration => {
                ScoringFamily::Nagui
            }
            QuestionKind::Labelling
            | QuestionKind::Matching
            | QuestionKind::OddOneOut
            | QuestionKind::Reordering => ScoringFamily::Fixed,
        }
    }

    /// Whether rounds of this kind may be played in buzzer mode.
    pub fn supports_buzzer(self) -> bool {
        matches!(
            self,
            QuestionKind::Blindtest | QuestionKind::Emoji | QuestionKind::Image
        )
    }
}

fn default_team_scoring() -> bool {
    true
}

/// Scoring and timing rules shared by every question of a round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundSettings {
    /// Default reward of a question.
    pub rewards_per_question: u32,
    /// Bonus reward.
    pub rewards_for_bonus: u32,
    /// Whether the first correct responder gets the bonus (riddle family).
    #[serde(default)]
    pub bonus_enabled: bool,
    /// Riddle or buzzer interaction.
    #[serde(default)]
    pub mode: AnswerMode,
    /// Answer window of every question, in seconds.
    pub answer_time_secs: u32,
    /// Points lost per extra revealed clue.
    #[serde(default)]
    pub clue_penalty: u32,
    /// Whether points are also credited to the player's team.
    #[serde(default = "default_team_scoring")]
    pub team_scoring: bool,
}

/// A themed group of questions of a single kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Round {
    /// Stable identifier.
    pub id: Uuid,
    /// Display title.
    pub title: String,
    /// Question kind, fixed at construction.
    kind: QuestionKind,
    /// Scoring rules.
    pub settings: RoundSettings,
    /// Ordered questions.
    pub questions: Vec<Question>,
    /// Highest reachable score, computed when the round is created or edited.
    pub max_points: Option<u32>,
    /// Points per team.
    pub scores: IndexMap<Uuid, i64>,
    /// When the round started.
    pub started_at: Option<SystemTime>,
    /// When the round ended.
    pub ended_at: Option<SystemTime>,
}

impl Round {
    /// Build a round. Max points are left unset until [`Round::refresh_max_points`] runs.
    pub fn new(
        id: Uuid,
        title: String,
        kind: QuestionKind,
        settings: RoundSettings,
        questions: Vec<Question>,
    ) -> Self {
        Self {
            id,
            title,
            kind,
            settings,
            questions,
            max_points: None,
            scores: IndexMap::new(),
            started_at: None,
            ended_at: None,
        }
    }

    /// Kind shared by every question of the round.
    pub fn kind(&self) -> QuestionKind {
        self.kind
    }

    /// Check the round structure.
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("round title must not be empty".into());
        }
        if self.questions.is_empty() {
            return Err(format!("round '{}' has no question", self.title));
        }
        if self.settings.answer_time_secs == 0 {
            return Err(format!("round '{}' needs a positive answer time", self.title));
        }
        if self.settings.mode == AnswerMode::Buzzer && !self.kind.supports_buzzer() {
            return Err(format!(
                "round '{}': {:?} questions cannot be played in buzzer mode",
                self.title, self.kind
            ));
        }
        for question in &self.questions {
            if question.kind() != self.kind {
                return Err(format!(
                    "round '{}' is {:?} but question {} is {:?}",
                    self.title,
                    self.kind,
                    question.id,
                    question.kind()
                ));
            }
            question
                .spec
                .validate()
                .map_err(|reason| format!("question {}: {reason}", question.id))?;
        }
        Ok(())
    }

    /// Base reward of a question. Nagui-family rounds ignore per-question overrides.
    pub fn reward_for(&self, question: &Question) -> u32 {
        match self.kind.family() {
            ScoringFamily::Nagui => self.settings.rewards_per_question,
            ScoringFamily::Riddle | ScoringFamily::Fixed => question
                .points
                .unwrap_or(self.settings.rewards_per_question),
        }
    }

    /// Scoring inputs for grading a question of this round.
    pub fn rewards_for(&self, question: &Question) -> Rewards {
        Rewards {
            reward: self.reward_for(question),
            bonus: self.settings.rewards_for_bonus,
            clue_penalty: self.settings.clue_penalty,
        }
    }

    /// Highest score a team can reach in the round.
    pub fn calculate_max_points(&self) -> u32 {
        let count = self.questions.len() as u32;
        let rewards: u32 = self
            .questions
            .iter()
            .map(|question| self.reward_for(question))
            .sum();

        match self.kind.family() {
            ScoringFamily::Riddle if self.settings.bonus_enabled => {
                rewards + count * self.settings.rewards_for_bonus
            }
            ScoringFamily::Riddle | ScoringFamily::Fixed => rewards,
            ScoringFamily::Nagui => {
                count * (self.settings.rewards_per_question + self.settings.rewards_for_bonus)
            }
        }
    }

    /// Recompute and store the max points.
    pub fn refresh_max_points(&mut self) -> u32 {
        let max_points = self.calculate_max_points();
        self.max_points = Some(max_points);
        max_points
    }

    /// Stamp the start and open a score line for every team.
    pub fn start(&mut self, team_ids: impl IntoIterator<Item = Uuid>, now: SystemTime) {
        self.started_at = Some(now);
        self.ended_at = None;
        for team_id in team_ids {
            self.scores.entry(team_id).or_insert(0);
        }
    }

    /// Stamp the end of the round.
    pub fn end(&mut self, now: SystemTime) {
        self.ended_at = Some(now);
    }

    /// Add points to a team.
    pub fn credit_team(&mut self, team_id: Uuid, points: u32) {
        *self.scores.entry(team_id).or_insert(0) += i64::from(points);
    }

    /// Position of a question in the round.
    pub fn question_index(&self, question_id: Uuid) -> Option<usize> {
        self.questions
            .iter()
            .position(|question| question.id == question_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::question::QuestionSpec;

    fn settings(bonus_enabled: bool) -> RoundSettings {
        RoundSettings {
            rewards_per_question: 100,
            rewards_for_bonus: 50,
            bonus_enabled,
            mode: AnswerMode::Riddle,
            answer_time_secs: 30,
            clue_penalty: 10,
            team_scoring: true,
        }
    }

    fn basic(points: Option<u32>) -> Question {
        Question::new(
            Uuid::new_v4(),
            "Capital of France?".into(),
            None,
            points,
            QuestionSpec::Basic {
                answers: vec!["Paris".into()],
            },
        )
    }

    fn nagui(points: Option<u32>) -> Question {
        Question::new(
            Uuid::new_v4(),
            "Pick one".into(),
            None,
            points,
            QuestionSpec::Nagui {
                choices: vec!["a".into(), "b".into(), "c".into()],
                answer_index: 0,
                duo_index: 1,
            },
        )
    }

    fn round(kind: QuestionKind, settings: RoundSettings, questions: Vec<Question>) -> Round {
        Round::new(Uuid::new_v4(), "Round".into(), kind, settings, questions)
    }

    #[test]
    fn basic_round_with_bonus_reaches_450() {
        let round = round(
            QuestionKind::Basic,
            settings(true),
            vec![basic(None), basic(None), basic(None)],
        );
        assert_eq!(round.calculate_max_points(), 450);
    }

    #[test]
    fn riddle_round_without_bonus_sums_rewards_with_overrides() {
        let round = round(
            QuestionKind::Basic,
            settings(false),
            vec![basic(Some(200)), basic(None)],
        );
        assert_eq!(round.calculate_max_points(), 300);
    }

    #[test]
    fn nagui_family_counts_reward_and_bonus_per_question() {
        let round = round(
            QuestionKind::Nagui,
            settings(false),
            vec![nagui(Some(999)), nagui(None)],
        );
        assert_eq!(round.calculate_max_points(), 300);
    }

    #[test]
    fn fixed_family_ignores_bonus() {
        let reorder = |points| {
            Question::new(
                Uuid::new_v4(),
                "Order".into(),
                None,
                points,
                QuestionSpec::Reordering {
                    items: vec!["a".into(), "b".into()],
                },
            )
        };
        let round = round(
            QuestionKind::Reordering,
            settings(true),
            vec![reorder(None), reorder(Some(40))],
        );
        assert_eq!(round.calculate_max_points(), 140);
    }

    #[test]
    fn empty_round_is_worth_zero() {
        for kind in [
            QuestionKind::Basic,
            QuestionKind::Nagui,
            QuestionKind::Matching,
        ] {
            assert_eq!(round(kind, settings(true), vec![]).calculate_max_points(), 0);
        }
    }

    #[test]
    fn max_points_are_idempotent() {
        let mut round = round(
            QuestionKind::Basic,
            settings(true),
            vec![basic(None), basic(Some(30))],
        );
        let first = round.refresh_max_points();
        let second = round.refresh_max_points();
        assert_eq!(first, second);
        assert_eq!(round.max_points, Some(230));
    }

    #[test]
    fn validation_rejects_structural_errors() {
        let empty = round(QuestionKind::Basic, settings(false), vec![]);
        assert!(empty.validate().is_err());

        let mixed = round(QuestionKind::Basic, settings(false), vec![nagui(None)]);
        assert!(mixed.validate().is_err());

        let mut buzzer = settings(false);
        buzzer.mode = AnswerMode::Buzzer;
        let buzzer_basic = round(QuestionKind::Basic, buzzer.clone(), vec![basic(None)]);
        assert!(buzzer_basic.validate().is_err());

        let blindtest = Question::new(
            Uuid::new_v4(),
            "Listen".into(),
            Some("media/track.mp3".into()),
            None,
            QuestionSpec::Blindtest {
                answers: vec!["Song".into()],
            },
        );
        let buzzer_blindtest = round(QuestionKind::Blindtest, buzzer, vec![blindtest]);
        assert!(buzzer_blindtest.validate().is_ok());

        let mut no_time = settings(false);
        no_time.answer_time_secs = 0;
        assert!(
            round(QuestionKind::Basic, no_time, vec![basic(None)])
                .validate()
                .is_err()
        );
    }

    #[test]
    fn start_opens_team_score_lines_and_credit_accumulates() {
        let mut round = round(QuestionKind::Basic, settings(false), vec![basic(None)]);
        let team = Uuid::new_v4();
        round.start([team], SystemTime::UNIX_EPOCH);
        assert_eq!(round.scores.get(&team), Some(&0));

        round.credit_team(team, 40);
        round.credit_team(team, 60);
        round.start([team], SystemTime::UNIX_EPOCH);
        assert_eq!(round.scores.get(&team), Some(&100));
    }
}
