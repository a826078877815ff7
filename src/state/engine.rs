//! Game orchestration: participants, status transitions and the question lifecycle.
//!
//! Every operation mutates the [`Game`] aggregate in place and is meant to run inside a
//! single optimistic transaction; an `Err` leaves the caller's copy to be discarded.

use std::time::{Duration, SystemTime};

use thiserror::Error;
use uuid::Uuid;

use crate::state::{
    game::{Game, Participant, PlayerState, PlayerStatus, Role, Team, User},
    question::{Answer, AnswerFormatError, Question, QuestionPhase, QuestionSpec, RecordedAnswer},
    round::{AnswerMode, RoundSettings, ScoringFamily},
    state_machine::{self, ApplyError, GameStatus, IllegalTransition},
    timer::{READY_COUNTDOWN_SECONDS, Timer, TimerError, TimerStatus},
};

/// Errors raised by game operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    /// Input does not describe a valid structure.
    #[error("{0}")]
    Validation(String),
    /// A referenced participant, team, round or question does not exist.
    #[error("{0}")]
    NotFound(String),
    /// The requested status is not reachable from the current one.
    #[error(transparent)]
    IllegalTransition(#[from] IllegalTransition),
    /// Operation not valid in the current lifecycle phase.
    #[error("{0}")]
    InvalidState(String),
    /// Player already holds a terminal status for the current question.
    #[error("player {0} already answered this question")]
    AlreadyAnswered(Uuid),
    /// The question does not take buzzes or answers right now.
    #[error("question is not accepting answers")]
    QuestionNotActive,
    /// Submission does not fit the question kind.
    #[error("invalid answer format: {0}")]
    InvalidAnswerFormat(String),
    /// Caller is not allowed to perform the operation.
    #[error("{0}")]
    Unauthorized(String),
}

impl From<AnswerFormatError> for GameError {
    fn from(value: AnswerFormatError) -> Self {
        GameError::InvalidAnswerFormat(value.0)
    }
}

impl From<TimerError> for GameError {
    fn from(value: TimerError) -> Self {
        GameError::InvalidState(value.to_string())
    }
}

impl From<ApplyError> for GameError {
    fn from(value: ApplyError) -> Self {
        GameError::InvalidState(value.to_string())
    }
}

/// Result alias for game operations.
pub type GameResult<T> = Result<T, GameError>;

/// Role requested when joining a game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinAs {
    /// Join as a player, in an existing team, a team found or created by name, or a
    /// solo team when neither is given.
    Player {
        /// Existing team to join.
        team_id: Option<Uuid>,
        /// Team to join or create by name.
        team_name: Option<String>,
    },
    /// Watch the game.
    Spectator,
}

impl Game {
    /// Register a participant, or refresh the display data of a returning one.
    pub fn join(&mut self, user: User, join_as: JoinAs, now: SystemTime) -> GameResult<()> {
        if self.status == GameStatus::GameEnd {
            return Err(GameError::InvalidState("the game is over".into()));
        }

        if let Some(existing) = self.participants.get_mut(&user.id) {
            existing.user.name = user.name;
            existing.user.avatar = user.avatar;
            return Ok(());
        }

        let role = match join_as {
            JoinAs::Spectator => Role::Spectator,
            JoinAs::Player { team_id, team_name } => {
                let team_id = self.resolve_team(team_id, team_name, &user)?;
                if let Some(index) = self.current_round {
                    if let Some(round) = self.rounds.get_mut(index) {
                        round.scores.entry(team_id).or_insert(0);
                    }
                }
                Role::Player(PlayerState {
                    team_id,
                    status: PlayerStatus::Idle,
                    authorized: true,
                    score: 0,
                })
            }
        };

        self.participants.insert(
            user.id,
            Participant {
                user,
                role,
                joined_at: now,
            },
        );
        Ok(())
    }

    fn resolve_team(
        &mut self,
        team_id: Option<Uuid>,
        team_name: Option<String>,
        user: &User,
    ) -> GameResult<Uuid> {
        if let Some(team_id) = team_id {
            return if self.teams.contains_key(&team_id) {
                Ok(team_id)
            } else {
                Err(GameError::NotFound(format!("team {team_id} not found")))
            };
        }

        let name = match team_name.map(|name| name.trim().to_owned()) {
            Some(name) if !name.is_empty() => {
                if let Some(team) = self
                    .teams
                    .values()
                    .find(|team| team.name.eq_ignore_ascii_case(&name))
                {
                    return Ok(team.id);
                }
                name
            }
            _ => user.name.clone(),
        };

        let team = Team {
            id: Uuid::new_v4(),
            name,
        };
        let id = team.id;
        self.teams.insert(id, team);
        Ok(id)
    }

    /// Remove a participant. A focused buzzer hands focus to the next one in the queue.
    pub fn leave(&mut self, user_id: Uuid, now: SystemTime) -> GameResult<()> {
        let participant = self
            .participants
            .get(&user_id)
            .ok_or_else(|| GameError::NotFound(format!("participant {user_id} not found")))?;

        if participant.is_organizer() && self.organizer_count() == 1 {
            return Err(GameError::InvalidState(
                "the last organizer cannot leave the game".into(),
            ));
        }

        self.participants.shift_remove(&user_id);
        self.drop_from_buzz_queue(user_id);
        self.check_question_completion(now)
    }

    /// Mark a player ready. Players flag themselves; organizers may flag anyone.
    pub fn set_player_ready(&mut self, actor: Uuid, player_id: Uuid) -> GameResult<()> {
        if actor != player_id {
            self.require_organizer(actor)?;
        }
        if matches!(
            self.status,
            GameStatus::QuestionActive | GameStatus::GameEnd
        ) {
            return Err(GameError::InvalidState(format!(
                "players cannot get ready during {:?}",
                self.status
            )));
        }

        let player = self.require_player_mut(player_id)?;
        player.status = PlayerStatus::Ready;
        Ok(())
    }

    /// Flip whether a player may take part. Returns the new flag.
    pub fn toggle_player_authorization(
        &mut self,
        actor: Uuid,
        player_id: Uuid,
        now: SystemTime,
    ) -> GameResult<bool> {
        self.require_organizer(actor)?;

        let player = self.require_player_mut(player_id)?;
        player.authorized = !player.authorized;
        let authorized = player.authorized;

        if !authorized {
            self.drop_from_buzz_queue(player_id);
        }
        self.check_question_completion(now)?;
        Ok(authorized)
    }

    /// Replace the settings of a round while the game is still being built.
    /// Returns the recomputed max points.
    pub fn update_round_settings(
        &mut self,
        actor: Uuid,
        round_id: Uuid,
        settings: RoundSettings,
    ) -> GameResult<u32> {
        self.require_organizer(actor)?;
        if self.status != GameStatus::Build {
            return Err(GameError::InvalidState(
                "round settings can only change while building the game".into(),
            ));
        }

        let round = self
            .rounds
            .iter_mut()
            .find(|round| round.id == round_id)
            .ok_or_else(|| GameError::NotFound(format!("round {round_id} not found")))?;
        let previous = std::mem::replace(&mut round.settings, settings);
        if let Err(reason) = round.validate() {
            round.settings = previous;
            return Err(GameError::Validation(reason));
        }
        Ok(round.refresh_max_points())
    }

    /// Move the game to `to`, running the side effects of the transition.
    pub fn advance(&mut self, actor: Uuid, to: GameStatus, now: SystemTime) -> GameResult<GameStatus> {
        self.require_organizer(actor)?;
        let plan = state_machine::plan(self, to)?;

        match (plan.from, plan.to) {
            (_, GameStatus::GameEnd) => self.finish(now),
            (_, GameStatus::Special) => self.pause_question_timer(now)?,
            (GameStatus::Special, _) => self.resume_question_timer(now)?,
            (GameStatus::GameStart, GameStatus::GameHome) => self.check_players_ready()?,
            (_, GameStatus::RoundStart) => self.start_next_round(now)?,
            (_, GameStatus::QuestionActive) => self.start_next_question(now)?,
            (GameStatus::QuestionActive, GameStatus::QuestionEnd) => {
                if let Some(question) = self.current_question_mut() {
                    if question.is_open() {
                        question.resolve(now);
                    }
                }
            }
            (_, GameStatus::RoundEnd) => {
                if let Some(round) = self.current_round.and_then(|i| self.rounds.get_mut(i)) {
                    round.end(now);
                }
            }
            _ => {}
        }

        Ok(state_machine::apply(self, &plan)?)
    }

    fn check_players_ready(&self) -> GameResult<()> {
        let authorized = self.authorized_players();
        if authorized.is_empty() {
            return Err(GameError::InvalidState(
                "at least one authorized player is required".into(),
            ));
        }
        let waiting = authorized
            .iter()
            .filter(|id| self.player(**id).is_some_and(|p| p.status != PlayerStatus::Ready))
            .count();
        if waiting > 0 {
            return Err(GameError::InvalidState(format!(
                "{waiting} authorized player(s) are not ready"
            )));
        }
        Ok(())
    }

    fn start_next_round(&mut self, now: SystemTime) -> GameResult<()> {
        let next = self.current_round.map_or(0, |index| index + 1);
        let team_ids: Vec<Uuid> = self.teams.keys().copied().collect();
        let round = self
            .rounds
            .get_mut(next)
            .ok_or_else(|| GameError::InvalidState("no round left to play".into()))?;

        round.start(team_ids, now);
        self.current_round = Some(next);
        self.current_question = None;
        self.reset_player_statuses();
        Ok(())
    }

    fn start_next_question(&mut self, now: SystemTime) -> GameResult<()> {
        let round_index = self
            .current_round
            .ok_or_else(|| GameError::InvalidState("no round in progress".into()))?;
        let next = self.current_question.map_or(0, |index| index + 1);
        let round = self
            .rounds
            .get_mut(round_index)
            .ok_or_else(|| GameError::InvalidState("no round in progress".into()))?;

        let window = Duration::from_secs(
            READY_COUNTDOWN_SECONDS + u64::from(round.settings.answer_time_secs),
        );
        let question = round
            .questions
            .get_mut(next)
            .ok_or_else(|| GameError::InvalidState("no question left in this round".into()))?;

        let mut timer = Timer::new(window, now);
        timer.start(window, now)?;
        question.start(timer);

        self.current_question = Some(next);
        self.reset_player_statuses();
        Ok(())
    }

    fn pause_question_timer(&mut self, now: SystemTime) -> GameResult<()> {
        if let Some(timer) = self.current_timer_mut() {
            if timer.status == TimerStatus::Start {
                timer.stop(now)?;
            }
        }
        Ok(())
    }

    fn resume_question_timer(&mut self, now: SystemTime) -> GameResult<()> {
        if let Some(timer) = self.current_timer_mut() {
            if timer.status == TimerStatus::Stop {
                timer.reset(now)?;
                timer.start(timer.duration, now)?;
            }
        }
        Ok(())
    }

    fn finish(&mut self, now: SystemTime) {
        if let Some(question) = self.current_question_mut() {
            if question.is_open() {
                question.resolve(now);
            }
        }
        if let Some(round) = self.current_round.and_then(|i| self.rounds.get_mut(i)) {
            if round.ended_at.is_none() {
                round.end(now);
            }
        }
    }

    /// Join the buzz queue of the current question.
    pub fn buzz(&mut self, player_id: Uuid, question_id: Uuid, now: SystemTime) -> GameResult<()> {
        let Some((round_index, question_index)) = self.open_question(question_id, now)? else {
            return Ok(());
        };
        if self.rounds[round_index].settings.mode != AnswerMode::Buzzer {
            return Err(GameError::InvalidState(
                "this round is not played with buzzers".into(),
            ));
        }
        let status = self.require_authorized_player(player_id)?;
        if matches!(status, PlayerStatus::Correct | PlayerStatus::Wrong) {
            return Err(GameError::AlreadyAnswered(player_id));
        }

        let question = &mut self.rounds[round_index].questions[question_index];
        if question.runtime.buzz_queue.contains(&player_id) {
            return Ok(());
        }
        question.runtime.buzz_queue.push(player_id);
        if question.runtime.buzz_queue.len() == 1 {
            question.runtime.phase = QuestionPhase::AwaitingAnswer;
            self.set_player_status(player_id, PlayerStatus::Focus);
        }
        Ok(())
    }

    /// Grade and record a submission, crediting points in the same mutation.
    pub fn submit_answer(
        &mut self,
        player_id: Uuid,
        question_id: Uuid,
        answer: Answer,
        now: SystemTime,
    ) -> GameResult<()> {
        let Some((round_index, question_index)) = self.open_question(question_id, now)? else {
            return Ok(());
        };
        let status = self.require_authorized_player(player_id)?;

        match self.rounds[round_index].settings.mode {
            AnswerMode::Riddle => {
                self.answer_riddle(round_index, question_index, player_id, answer, now)
            }
            AnswerMode::Buzzer => self.answer_buzzer(
                round_index,
                question_index,
                player_id,
                status,
                answer,
                now,
            ),
        }
    }

    fn answer_riddle(
        &mut self,
        round_index: usize,
        question_index: usize,
        player_id: Uuid,
        answer: Answer,
        now: SystemTime,
    ) -> GameResult<()> {
        let round = &self.rounds[round_index];
        let question = &round.questions[question_index];
        if question.answer_of(player_id).is_some() {
            return Err(GameError::AlreadyAnswered(player_id));
        }

        let grade = question.grade(&answer, round.rewards_for(question))?;
        let bonus = grade.correct
            && round.kind().family() == ScoringFamily::Riddle
            && round.settings.bonus_enabled
            && question.runtime.bonus_holder.is_none();
        let points = grade.points + if bonus { round.settings.rewards_for_bonus } else { 0 };

        let question = &mut self.rounds[round_index].questions[question_index];
        if bonus {
            question.runtime.bonus_holder = Some(player_id);
        }
        question.runtime.answers.push(RecordedAnswer {
            player_id,
            answer,
            points,
            correct: grade.correct,
            bonus,
            submitted_at: now,
        });

        self.set_player_status(
            player_id,
            if grade.correct {
                PlayerStatus::Correct
            } else {
                PlayerStatus::Wrong
            },
        );
        self.credit(round_index, player_id, points);
        self.check_question_completion(now)
    }

    fn answer_buzzer(
        &mut self,
        round_index: usize,
        question_index: usize,
        player_id: Uuid,
        status: PlayerStatus,
        answer: Answer,
        now: SystemTime,
    ) -> GameResult<()> {
        if matches!(status, PlayerStatus::Correct | PlayerStatus::Wrong) {
            return Err(GameError::AlreadyAnswered(player_id));
        }
        let round = &self.rounds[round_index];
        let question = &round.questions[question_index];
        if question.focused_player() != Some(player_id) {
            return Err(GameError::InvalidState(
                "only the player holding focus can answer".into(),
            ));
        }

        let grade = question.grade(&answer, round.rewards_for(question))?;
        let bonus = grade.correct && round.settings.bonus_enabled;
        let points = if grade.correct {
            grade.points + if bonus { round.settings.rewards_for_bonus } else { 0 }
        } else {
            0
        };

        let question = &mut self.rounds[round_index].questions[question_index];
        question.runtime.answers.push(RecordedAnswer {
            player_id,
            answer,
            points,
            correct: grade.correct,
            bonus,
            submitted_at: now,
        });
        question.runtime.buzz_queue.remove(0);

        if grade.correct {
            question.runtime.winner = Some(player_id);
            if bonus {
                question.runtime.bonus_holder = Some(player_id);
            }
            self.set_player_status(player_id, PlayerStatus::Correct);
            self.credit(round_index, player_id, points);
            return self.resolve_current_question(now);
        }

        let next = question.runtime.buzz_queue.first().copied();
        if next.is_none() {
            question.runtime.phase = QuestionPhase::Active;
        }
        self.set_player_status(player_id, PlayerStatus::Wrong);
        if let Some(next) = next {
            self.set_player_status(next, PlayerStatus::Focus);
        }
        self.check_question_completion(now)
    }

    /// Reveal the next clue of a progressive-clues question.
    pub fn reveal_clue(&mut self, actor: Uuid, question_id: Uuid, now: SystemTime) -> GameResult<()> {
        self.require_organizer(actor)?;
        let Some((round_index, question_index)) = self.open_question(question_id, now)? else {
            return Ok(());
        };

        let question = &mut self.rounds[round_index].questions[question_index];
        let total = match &question.spec {
            QuestionSpec::ProgressiveClues { clues, .. } => clues.len(),
            _ => {
                return Err(GameError::InvalidState(format!(
                    "{:?} questions have no clue to reveal",
                    question.kind()
                )));
            }
        };
        if question.runtime.revealed_clues >= total {
            return Err(GameError::InvalidState(
                "every clue is already revealed".into(),
            ));
        }
        question.runtime.revealed_clues += 1;
        Ok(())
    }

    /// Resolve the current question once its answer window is over.
    pub fn expire_question(&mut self, question_id: Uuid, now: SystemTime) -> GameResult<()> {
        let Some(question) = self.current_question().filter(|q| q.id == question_id) else {
            return self.stale_question(question_id);
        };
        if !question.is_open() {
            return Ok(());
        }
        let expired = question
            .runtime
            .timer
            .as_ref()
            .is_some_and(|timer| timer.is_expired(now));
        if !expired {
            return Err(GameError::InvalidState(
                "the answer time is not over yet".into(),
            ));
        }
        self.resolve_current_question(now)
    }

    /// Locate the current question if it is `question_id` and takes answers at `now`.
    /// `Ok(None)` flags a stale request about a question that is no longer current.
    fn open_question(&self, question_id: Uuid, now: SystemTime) -> GameResult<Option<(usize, usize)>> {
        let current = self.current_round.zip(self.current_question);
        let Some((round_index, question_index)) =
            current.filter(|_| self.current_question().is_some_and(|q| q.id == question_id))
        else {
            return self.stale_question(question_id).map(|()| None);
        };

        let round = &self.rounds[round_index];
        let question = &round.questions[question_index];
        if self.status != GameStatus::QuestionActive || !question.is_open() {
            return Err(GameError::QuestionNotActive);
        }

        let answer_window = Duration::from_secs(u64::from(round.settings.answer_time_secs));
        let accepting = question.runtime.timer.as_ref().is_some_and(|timer| {
            let remaining = timer.remaining(now);
            !timer.is_expired(now) && remaining <= answer_window
        });
        if !accepting {
            return Err(GameError::QuestionNotActive);
        }

        Ok(Some((round_index, question_index)))
    }

    /// A request about a question that is not current is a no-op once that question is
    /// resolved or already played; one about a question still to come is rejected.
    fn stale_question(&self, question_id: Uuid) -> GameResult<()> {
        let Some((round_index, question_index)) = self.locate_question(question_id) else {
            return Err(GameError::NotFound(format!(
                "question {question_id} not found"
            )));
        };
        let resolved = self.rounds[round_index].questions[question_index].runtime.phase
            == QuestionPhase::Resolved;
        let passed = match (self.current_round, self.current_question) {
            (Some(current_round), Some(current_question)) => {
                (round_index, question_index) < (current_round, current_question)
            }
            (Some(current_round), None) => round_index < current_round,
            (None, _) => false,
        };
        if resolved || passed {
            tracing::debug!(game_id = %self.id, %question_id, "ignoring request for a question that is no longer current");
            Ok(())
        } else {
            Err(GameError::QuestionNotActive)
        }
    }

    /// Resolve the question when nobody is left to answer it.
    fn check_question_completion(&mut self, now: SystemTime) -> GameResult<()> {
        if self.status != GameStatus::QuestionActive {
            return Ok(());
        }
        let Some(round) = self.current_round() else {
            return Ok(());
        };
        let Some(question) = self.current_question().filter(|q| q.is_open()) else {
            return Ok(());
        };

        let authorized = self.authorized_players();
        if authorized.is_empty() {
            return Ok(());
        }
        let complete = match round.settings.mode {
            AnswerMode::Riddle => authorized
                .iter()
                .all(|id| question.answer_of(*id).is_some()),
            AnswerMode::Buzzer => authorized
                .iter()
                .all(|id| self.player(*id).is_some_and(|p| p.status == PlayerStatus::Wrong)),
        };

        if complete {
            self.resolve_current_question(now)?;
        }
        Ok(())
    }

    fn resolve_current_question(&mut self, now: SystemTime) -> GameResult<()> {
        if let Some(question) = self.current_question_mut() {
            question.resolve(now);
        }
        for participant in self.participants.values_mut() {
            if let Some(player) = participant.player_mut() {
                if player.status == PlayerStatus::Focus {
                    player.status = PlayerStatus::Idle;
                }
            }
        }
        if self.status == GameStatus::QuestionActive {
            let plan = state_machine::plan(self, GameStatus::QuestionEnd)?;
            state_machine::apply(self, &plan)?;
            tracing::debug!(game_id = %self.id, "question resolved");
        }
        Ok(())
    }

    fn drop_from_buzz_queue(&mut self, player_id: Uuid) {
        let Some(question) = self.current_question_mut().filter(|q| q.is_open()) else {
            return;
        };
        let Some(position) = question
            .runtime
            .buzz_queue
            .iter()
            .position(|id| *id == player_id)
        else {
            return;
        };

        question.runtime.buzz_queue.remove(position);
        if position != 0 {
            return;
        }
        let next = question.runtime.buzz_queue.first().copied();
        match next {
            Some(next) => self.set_player_status(next, PlayerStatus::Focus),
            None => question.runtime.phase = QuestionPhase::Active,
        }
    }

    fn credit(&mut self, round_index: usize, player_id: Uuid, points: u32) {
        if points == 0 {
            return;
        }
        let Some(player) = self.player_mut(player_id) else {
            return;
        };
        player.score += i64::from(points);
        let team_id = player.team_id;

        let round = &mut self.rounds[round_index];
        if round.settings.team_scoring {
            round.credit_team(team_id, points);
        }
    }

    fn set_player_status(&mut self, player_id: Uuid, status: PlayerStatus) {
        if let Some(player) = self.player_mut(player_id) {
            player.status = status;
        }
    }

    fn current_question_mut(&mut self) -> Option<&mut Question> {
        let question_index = self.current_question?;
        self.current_round
            .and_then(|index| self.rounds.get_mut(index))
            .and_then(|round| round.questions.get_mut(question_index))
    }

    fn current_timer_mut(&mut self) -> Option<&mut Timer> {
        self.current_question_mut()
            .and_then(|question| question.runtime.timer.as_mut())
    }

    fn require_organizer(&self, actor: Uuid) -> GameResult<()> {
        if self
            .participants
            .get(&actor)
            .is_some_and(Participant::is_organizer)
        {
            Ok(())
        } else {
            Err(GameError::Unauthorized(format!(
                "user {actor} is not an organizer of this game"
            )))
        }
    }

    fn require_player_mut(&mut self, player_id: Uuid) -> GameResult<&mut PlayerState> {
        let participant = self
            .participants
            .get_mut(&player_id)
            .ok_or_else(|| GameError::NotFound(format!("participant {player_id} not found")))?;
        participant
            .player_mut()
            .ok_or_else(|| GameError::InvalidState(format!("participant {player_id} is not a player")))
    }

    fn require_authorized_player(&self, player_id: Uuid) -> GameResult<PlayerStatus> {
        let participant = self
            .participants
            .get(&player_id)
            .ok_or_else(|| GameError::NotFound(format!("participant {player_id} not found")))?;
        match participant.player() {
            Some(player) if player.authorized => Ok(player.status),
            Some(_) => Err(GameError::Unauthorized(format!(
                "player {player_id} is not authorized to play"
            ))),
            None => Err(GameError::Unauthorized(format!(
                "participant {player_id} is not a player"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{
        question::{NaguiOption, QuestionKind},
        round::Round,
    };

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn user(name: &str) -> User {
        User {
            id: Uuid::new_v4(),
            name: name.into(),
            avatar: None,
        }
    }

    fn settings(mode: AnswerMode, bonus_enabled: bool) -> RoundSettings {
        RoundSettings {
            rewards_per_question: 100,
            rewards_for_bonus: 50,
            bonus_enabled,
            mode,
            answer_time_secs: 30,
            clue_penalty: 20,
            team_scoring: true,
        }
    }

    fn text_question(spec: QuestionSpec) -> Question {
        Question::new(Uuid::new_v4(), "Who?".into(), None, None, spec)
    }

    struct Table {
        game: Game,
        host: Uuid,
        players: Vec<Uuid>,
    }

    impl Table {
        fn question_id(&self) -> Uuid {
            self.game.current_question().unwrap().id
        }

        fn score(&self, player: Uuid) -> i64 {
            self.game.player(player).unwrap().score
        }

        fn status(&self, player: Uuid) -> PlayerStatus {
            self.game.player(player).unwrap().status
        }
    }

    /// Game with one round, `player_count` solo players, first question active at t=10.
    fn table(
        kind: QuestionKind,
        settings: RoundSettings,
        specs: Vec<QuestionSpec>,
        player_count: usize,
    ) -> Table {
        let host = user("Host");
        let host_id = host.id;
        let mut round = Round::new(
            Uuid::new_v4(),
            "Round 1".into(),
            kind,
            settings,
            specs.into_iter().map(text_question).collect(),
        );
        round.refresh_max_points();
        let mut game = Game::new("Quiz night".into(), host, vec![round], at(0));

        game.advance(host_id, GameStatus::GameStart, at(1)).unwrap();
        let mut players = Vec::new();
        for index in 0..player_count {
            let player = user(&format!("Player {index}"));
            players.push(player.id);
            game.join(
                player,
                JoinAs::Player {
                    team_id: None,
                    team_name: None,
                },
                at(1),
            )
            .unwrap();
        }
        for player in &players {
            game.set_player_ready(*player, *player).unwrap();
        }
        game.advance(host_id, GameStatus::GameHome, at(2)).unwrap();
        game.advance(host_id, GameStatus::RoundStart, at(3)).unwrap();
        game.advance(host_id, GameStatus::QuestionActive, at(10))
            .unwrap();

        Table {
            game,
            host: host_id,
            players,
        }
    }

    fn basic(answer: &str) -> QuestionSpec {
        QuestionSpec::Basic {
            answers: vec![answer.into()],
        }
    }

    fn blindtest(answer: &str) -> QuestionSpec {
        QuestionSpec::Blindtest {
            answers: vec![answer.into()],
        }
    }

    fn text(value: &str) -> Answer {
        Answer::Text(value.into())
    }

    #[test]
    fn riddle_question_resolves_after_every_player_answered() {
        let mut t = table(
            QuestionKind::Basic,
            settings(AnswerMode::Riddle, true),
            vec![basic("Paris"), basic("Rome")],
            3,
        );
        let question_id = t.question_id();
        let [p1, p2, p3] = [t.players[0], t.players[1], t.players[2]];

        t.game.submit_answer(p2, question_id, text("Lyon"), at(16)).unwrap();
        t.game.submit_answer(p1, question_id, text("paris"), at(17)).unwrap();
        assert_eq!(t.game.status, GameStatus::QuestionActive);
        t.game.submit_answer(p3, question_id, text("PARIS"), at(18)).unwrap();

        let question = t.game.current_question().unwrap();
        assert_eq!(question.runtime.phase, QuestionPhase::Resolved);
        assert_eq!(question.runtime.bonus_holder, Some(p1));
        assert_eq!(t.game.status, GameStatus::QuestionEnd);

        assert_eq!(t.score(p1), 150);
        assert_eq!(t.score(p2), 0);
        assert_eq!(t.score(p3), 100);
        let awarded: u32 = question.runtime.answers.iter().map(|a| a.points).sum();
        let correct: u32 = question
            .runtime
            .answers
            .iter()
            .filter(|a| a.correct)
            .map(|_| 100)
            .sum();
        assert_eq!(awarded, correct + 50);
        assert_eq!(t.status(p2), PlayerStatus::Wrong);
    }

    #[test]
    fn answering_a_resolved_question_is_rejected_without_scoring() {
        let mut t = table(
            QuestionKind::Basic,
            settings(AnswerMode::Riddle, false),
            vec![basic("Paris")],
            1,
        );
        let question_id = t.question_id();
        let player = t.players[0];
        t.game.submit_answer(player, question_id, text("Paris"), at(20)).unwrap();
        let before = t.score(player);

        let err = t
            .game
            .submit_answer(player, question_id, text("Paris"), at(21))
            .unwrap_err();
        assert_eq!(err, GameError::QuestionNotActive);
        assert_eq!(t.score(player), before);
    }

    #[test]
    fn riddle_player_cannot_answer_twice() {
        let mut t = table(
            QuestionKind::Basic,
            settings(AnswerMode::Riddle, false),
            vec![basic("Paris")],
            2,
        );
        let question_id = t.question_id();
        let player = t.players[0];
        t.game.submit_answer(player, question_id, text("Lyon"), at(20)).unwrap();

        let err = t
            .game
            .submit_answer(player, question_id, text("Paris"), at(21))
            .unwrap_err();
        assert_eq!(err, GameError::AlreadyAnswered(player));
        assert_eq!(t.score(player), 0);
    }

    #[test]
    fn buzzer_queue_follows_commit_order_and_promotes_after_wrong_answer() {
        let mut t = table(
            QuestionKind::Blindtest,
            settings(AnswerMode::Buzzer, false),
            vec![blindtest("Bohemian Rhapsody")],
            2,
        );
        let question_id = t.question_id();
        let [p1, p2] = [t.players[0], t.players[1]];

        t.game.buzz(p1, question_id, at(16)).unwrap();
        t.game.buzz(p2, question_id, at(16)).unwrap();
        let question = t.game.current_question().unwrap();
        assert_eq!(question.runtime.buzz_queue, vec![p1, p2]);
        assert_eq!(question.runtime.phase, QuestionPhase::AwaitingAnswer);
        assert_eq!(t.status(p1), PlayerStatus::Focus);

        let err = t
            .game
            .submit_answer(p2, question_id, text("Bohemian Rhapsody"), at(17))
            .unwrap_err();
        assert!(matches!(err, GameError::InvalidState(_)));

        t.game.submit_answer(p1, question_id, text("Yesterday"), at(18)).unwrap();
        assert_eq!(t.status(p1), PlayerStatus::Wrong);
        assert_eq!(t.status(p2), PlayerStatus::Focus);
        assert_eq!(t.game.current_question().unwrap().focused_player(), Some(p2));

        t.game
            .submit_answer(p2, question_id, text("bohemian rhapsody"), at(19))
            .unwrap();
        let question = t.game.current_question().unwrap();
        assert_eq!(question.runtime.phase, QuestionPhase::Resolved);
        assert_eq!(question.runtime.winner, Some(p2));
        assert_eq!(t.game.status, GameStatus::QuestionEnd);
        assert_eq!(t.score(p2), 100);
        assert_eq!(t.score(p1), 0);

        let team = t.game.player(p2).unwrap().team_id;
        assert_eq!(t.game.rounds[0].scores.get(&team), Some(&100));
    }

    #[test]
    fn buzzing_twice_is_a_no_op_and_wrong_players_cannot_buzz_again() {
        let mut t = table(
            QuestionKind::Emoji,
            settings(AnswerMode::Buzzer, true),
            vec![QuestionSpec::Emoji {
                emojis: "🦁👑".into(),
                answers: vec!["The Lion King".into()],
            }],
            2,
        );
        let question_id = t.question_id();
        let [p1, p2] = [t.players[0], t.players[1]];

        t.game.buzz(p1, question_id, at(16)).unwrap();
        let snapshot = t.game.clone();
        t.game.buzz(p1, question_id, at(17)).unwrap();
        assert_eq!(t.game, snapshot);

        t.game.submit_answer(p1, question_id, text("Bambi"), at(18)).unwrap();
        assert_eq!(
            t.game.current_question().unwrap().runtime.phase,
            QuestionPhase::Active
        );
        assert_eq!(
            t.game.buzz(p1, question_id, at(19)),
            Err(GameError::AlreadyAnswered(p1))
        );

        t.game.buzz(p2, question_id, at(20)).unwrap();
        t.game
            .submit_answer(p2, question_id, text("the lion king"), at(21))
            .unwrap();
        assert_eq!(t.score(p2), 150);
    }

    #[test]
    fn buzzer_question_resolves_when_everybody_failed() {
        let mut t = table(
            QuestionKind::Image,
            settings(AnswerMode::Buzzer, false),
            vec![QuestionSpec::Image {
                answers: vec!["Mona Lisa".into()],
            }],
            1,
        );
        let question_id = t.question_id();
        let player = t.players[0];

        t.game.buzz(player, question_id, at(16)).unwrap();
        t.game.submit_answer(player, question_id, text("Guernica"), at(17)).unwrap();
        assert_eq!(t.game.status, GameStatus::QuestionEnd);
        assert_eq!(t.game.current_question().unwrap().runtime.winner, None);
    }

    #[test]
    fn buzz_is_rejected_in_riddle_rounds() {
        let mut t = table(
            QuestionKind::Basic,
            settings(AnswerMode::Riddle, false),
            vec![basic("Paris")],
            1,
        );
        let question_id = t.question_id();
        assert!(matches!(
            t.game.buzz(t.players[0], question_id, at(16)),
            Err(GameError::InvalidState(_))
        ));
    }

    #[test]
    fn stale_submission_is_ignored() {
        let mut t = table(
            QuestionKind::Basic,
            settings(AnswerMode::Riddle, false),
            vec![basic("Paris"), basic("Rome")],
            2,
        );
        let first = t.question_id();
        t.game.advance(t.host, GameStatus::QuestionEnd, at(20)).unwrap();
        t.game.advance(t.host, GameStatus::QuestionActive, at(30)).unwrap();

        let snapshot = t.game.clone();
        t.game
            .submit_answer(t.players[0], first, text("Paris"), at(40))
            .unwrap();
        assert_eq!(t.game, snapshot);

        let unknown = Uuid::new_v4();
        assert!(matches!(
            t.game.submit_answer(t.players[0], unknown, text("Paris"), at(40)),
            Err(GameError::NotFound(_))
        ));
    }

    #[test]
    fn upcoming_questions_are_not_active() {
        let mut t = table(
            QuestionKind::Basic,
            settings(AnswerMode::Riddle, false),
            vec![basic("Paris"), basic("Rome")],
            2,
        );
        let upcoming = t.game.rounds[0].questions[1].id;

        let snapshot = t.game.clone();
        assert!(matches!(
            t.game.submit_answer(t.players[0], upcoming, text("Rome"), at(20)),
            Err(GameError::QuestionNotActive)
        ));
        assert!(matches!(
            t.game.buzz(t.players[0], upcoming, at(20)),
            Err(GameError::QuestionNotActive)
        ));
        assert!(matches!(
            t.game.expire_question(upcoming, at(60)),
            Err(GameError::QuestionNotActive)
        ));
        assert_eq!(t.game, snapshot);
        assert_eq!(
            t.game.rounds[0].questions[1].runtime.phase,
            QuestionPhase::Idle
        );
    }

    #[test]
    fn answers_are_only_taken_inside_the_answer_window() {
        let mut t = table(
            QuestionKind::Basic,
            settings(AnswerMode::Riddle, false),
            vec![basic("Paris")],
            2,
        );
        let question_id = t.question_id();
        let player = t.players[0];

        assert_eq!(
            t.game.submit_answer(player, question_id, text("Paris"), at(12)),
            Err(GameError::QuestionNotActive)
        );
        assert_eq!(
            t.game.submit_answer(player, question_id, text("Paris"), at(45)),
            Err(GameError::QuestionNotActive)
        );

        assert!(matches!(
            t.game.expire_question(question_id, at(30)),
            Err(GameError::InvalidState(_))
        ));
        t.game.expire_question(question_id, at(45)).unwrap();
        assert_eq!(t.game.status, GameStatus::QuestionEnd);
        t.game.expire_question(question_id, at(46)).unwrap();
    }

    #[test]
    fn special_status_freezes_and_resumes_the_question_timer() {
        let mut t = table(
            QuestionKind::Basic,
            settings(AnswerMode::Riddle, false),
            vec![basic("Paris")],
            1,
        );
        let question_id = t.question_id();

        t.game.advance(t.host, GameStatus::Special, at(20)).unwrap();
        assert_eq!(t.game.status_before_special, Some(GameStatus::QuestionActive));
        assert_eq!(
            t.game
                .submit_answer(t.players[0], question_id, text("Paris"), at(21)),
            Err(GameError::QuestionNotActive)
        );

        t.game
            .advance(t.host, GameStatus::QuestionActive, at(100))
            .unwrap();
        let timer = t.game.current_question().unwrap().runtime.timer.clone().unwrap();
        assert_eq!(timer.remaining(at(100)), Duration::from_secs(25));
        t.game
            .submit_answer(t.players[0], question_id, text("Paris"), at(101))
            .unwrap();
    }

    #[test]
    fn advance_enforces_role_table_and_preconditions() {
        let host = user("Host");
        let host_id = host.id;
        let round = Round::new(
            Uuid::new_v4(),
            "Only".into(),
            QuestionKind::Basic,
            settings(AnswerMode::Riddle, false),
            vec![text_question(basic("Paris"))],
        );
        let mut game = Game::new("Quiz".into(), host, vec![round], at(0));

        assert!(matches!(
            game.advance(Uuid::new_v4(), GameStatus::GameStart, at(1)),
            Err(GameError::Unauthorized(_))
        ));
        assert!(matches!(
            game.advance(host_id, GameStatus::RoundStart, at(1)),
            Err(GameError::IllegalTransition(_))
        ));

        game.advance(host_id, GameStatus::GameStart, at(1)).unwrap();
        assert!(matches!(
            game.advance(host_id, GameStatus::GameHome, at(2)),
            Err(GameError::InvalidState(_))
        ));

        let player = user("Alice");
        let player_id = player.id;
        game.join(
            player,
            JoinAs::Player {
                team_id: None,
                team_name: Some("Owls".into()),
            },
            at(2),
        )
        .unwrap();
        assert!(matches!(
            game.advance(host_id, GameStatus::GameHome, at(2)),
            Err(GameError::InvalidState(_))
        ));

        game.set_player_ready(player_id, player_id).unwrap();
        game.advance(host_id, GameStatus::GameHome, at(3)).unwrap();
        game.advance(host_id, GameStatus::RoundStart, at(4)).unwrap();
        assert_eq!(game.rounds[0].started_at, Some(at(4)));
        game.advance(host_id, GameStatus::QuestionActive, at(5)).unwrap();
        game.advance(host_id, GameStatus::QuestionEnd, at(6)).unwrap();
        assert!(!game.current_question().unwrap().is_open());

        assert!(matches!(
            game.advance(host_id, GameStatus::QuestionActive, at(7)),
            Err(GameError::InvalidState(_))
        ));
        game.advance(host_id, GameStatus::RoundEnd, at(8)).unwrap();
        assert_eq!(game.rounds[0].ended_at, Some(at(8)));
        assert!(matches!(
            game.advance(host_id, GameStatus::RoundStart, at(9)),
            Err(GameError::InvalidState(_))
        ));
        game.advance(host_id, GameStatus::GameEnd, at(10)).unwrap();
        assert_eq!(game.status, GameStatus::GameEnd);
    }

    #[test]
    fn join_reuses_teams_updates_returning_users_and_closes_with_the_game() {
        let mut game = Game::fixture();
        let host = *game.participants.keys().next().unwrap();
        let alice = user("Alice");
        let bob = user("Bob");
        let join = |name: &str| JoinAs::Player {
            team_id: None,
            team_name: Some(name.into()),
        };

        game.join(alice.clone(), join("Owls"), at(1)).unwrap();
        game.join(bob.clone(), join("owls"), at(1)).unwrap();
        assert_eq!(game.teams.len(), 1);
        assert_eq!(
            game.player(alice.id).unwrap().team_id,
            game.player(bob.id).unwrap().team_id
        );

        let renamed = User {
            name: "Alicia".into(),
            ..alice.clone()
        };
        game.join(renamed, JoinAs::Spectator, at(2)).unwrap();
        assert_eq!(game.participants[&alice.id].user.name, "Alicia");
        assert!(game.player(alice.id).is_some());

        let solo = user("Carol");
        game.join(
            solo.clone(),
            JoinAs::Player {
                team_id: None,
                team_name: None,
            },
            at(3),
        )
        .unwrap();
        let solo_team = game.player(solo.id).unwrap().team_id;
        assert_eq!(game.teams[&solo_team].name, "Carol");

        game.status = GameStatus::GameEnd;
        assert!(matches!(
            game.join(user("Dave"), JoinAs::Spectator, at(4)),
            Err(GameError::InvalidState(_))
        ));
        assert!(matches!(
            game.leave(host, at(4)),
            Err(GameError::InvalidState(_))
        ));
    }

    #[test]
    fn leaving_focused_buzzer_hands_focus_to_the_next_one() {
        let mut t = table(
            QuestionKind::Blindtest,
            settings(AnswerMode::Buzzer, false),
            vec![blindtest("Song")],
            3,
        );
        let question_id = t.question_id();
        let [p1, p2] = [t.players[0], t.players[1]];
        t.game.buzz(p1, question_id, at(16)).unwrap();
        t.game.buzz(p2, question_id, at(17)).unwrap();

        t.game.leave(p1, at(18)).unwrap();
        assert_eq!(t.game.current_question().unwrap().runtime.buzz_queue, vec![p2]);
        assert_eq!(t.status(p2), PlayerStatus::Focus);
        assert!(!t.game.participants.contains_key(&p1));
    }

    #[test]
    fn riddle_completion_is_rechecked_when_a_player_leaves_or_is_banned() {
        let mut t = table(
            QuestionKind::Basic,
            settings(AnswerMode::Riddle, false),
            vec![basic("Paris")],
            3,
        );
        let question_id = t.question_id();
        let [p1, p2, p3] = [t.players[0], t.players[1], t.players[2]];
        t.game.submit_answer(p1, question_id, text("Paris"), at(16)).unwrap();

        t.game.toggle_player_authorization(t.host, p2, at(17)).unwrap();
        assert_eq!(t.game.status, GameStatus::QuestionActive);
        t.game.leave(p3, at(18)).unwrap();
        assert_eq!(t.game.status, GameStatus::QuestionEnd);

        assert!(matches!(
            t.game.toggle_player_authorization(p1, p2, at(19)),
            Err(GameError::Unauthorized(_))
        ));
    }

    #[test]
    fn readiness_is_rejected_while_a_question_is_active() {
        let mut t = table(
            QuestionKind::Basic,
            settings(AnswerMode::Riddle, false),
            vec![basic("Paris")],
            2,
        );
        let [p1, p2] = [t.players[0], t.players[1]];
        assert!(matches!(
            t.game.set_player_ready(p1, p1),
            Err(GameError::InvalidState(_))
        ));
        assert!(matches!(
            t.game.set_player_ready(p1, p2),
            Err(GameError::Unauthorized(_))
        ));
    }

    #[test]
    fn progressive_clues_cost_points_once_revealed() {
        let mut t = table(
            QuestionKind::ProgressiveClues,
            settings(AnswerMode::Riddle, false),
            vec![QuestionSpec::ProgressiveClues {
                clues: vec!["Austrian".into(), "Composer".into(), "Requiem".into()],
                answers: vec!["Mozart".into()],
            }],
            2,
        );
        let question_id = t.question_id();
        let [p1, p2] = [t.players[0], t.players[1]];

        t.game.submit_answer(p1, question_id, text("Mozart"), at(16)).unwrap();
        t.game.reveal_clue(t.host, question_id, at(17)).unwrap();
        t.game.reveal_clue(t.host, question_id, at(18)).unwrap();
        assert!(matches!(
            t.game.reveal_clue(t.host, question_id, at(19)),
            Err(GameError::InvalidState(_))
        ));
        t.game.submit_answer(p2, question_id, text("mozart"), at(20)).unwrap();

        assert_eq!(t.score(p1), 150);
        assert_eq!(t.score(p2), 110);
    }

    #[test]
    fn nagui_answer_with_wrong_shape_is_rejected() {
        let mut t = table(
            QuestionKind::Nagui,
            settings(AnswerMode::Riddle, false),
            vec![QuestionSpec::Nagui {
                choices: vec!["Rome".into(), "Madrid".into(), "Lisbon".into()],
                answer_index: 2,
                duo_index: 1,
            }],
            1,
        );
        let question_id = t.question_id();
        let player = t.players[0];

        assert!(matches!(
            t.game.submit_answer(player, question_id, text("Lisbon"), at(16)),
            Err(GameError::InvalidAnswerFormat(_))
        ));
        assert!(t.game.current_question().unwrap().runtime.answers.is_empty());

        let duo = Answer::Nagui {
            option: NaguiOption::Duo,
            choice: Some(2),
            text: None,
        };
        t.game.submit_answer(player, question_id, duo, at(17)).unwrap();
        assert_eq!(t.score(player), 50);
    }

    #[test]
    fn round_settings_only_change_while_building() {
        let host = user("Host");
        let host_id = host.id;
        let round = Round::new(
            Uuid::new_v4(),
            "Only".into(),
            QuestionKind::Basic,
            settings(AnswerMode::Riddle, false),
            vec![text_question(basic("Paris"))],
        );
        let round_id = round.id;
        let mut game = Game::new("Quiz".into(), host, vec![round], at(0));

        let max = game
            .update_round_settings(host_id, round_id, settings(AnswerMode::Riddle, true))
            .unwrap();
        assert_eq!(max, 150);
        assert_eq!(game.rounds[0].max_points, Some(150));

        assert!(matches!(
            game.update_round_settings(host_id, round_id, settings(AnswerMode::Buzzer, true)),
            Err(GameError::Validation(_))
        ));

        game.advance(host_id, GameStatus::GameStart, at(1)).unwrap();
        assert!(matches!(
            game.update_round_settings(host_id, round_id, settings(AnswerMode::Riddle, false)),
            Err(GameError::InvalidState(_))
        ));
    }

    #[test]
    fn scoreboard_ranks_teams_and_reports_completion() {
        let mut t = table(
            QuestionKind::Basic,
            settings(AnswerMode::Riddle, false),
            vec![basic("Paris"), basic("Rome")],
            2,
        );
        let question_id = t.question_id();
        let [p1, p2] = [t.players[0], t.players[1]];
        t.game.submit_answer(p1, question_id, text("Lyon"), at(16)).unwrap();
        t.game.submit_answer(p2, question_id, text("Paris"), at(16)).unwrap();

        let board = t.game.scoreboard();
        let winner_team = t.game.player(p2).unwrap().team_id;
        assert_eq!(board.teams[0].team_id, winner_team);
        assert_eq!(board.teams[0].total, 100);
        assert_eq!(board.players[0].player_id, p2);

        let round = &board.rounds[0];
        assert_eq!(round.max_points, 200);
        let line = round.scores.iter().find(|s| s.team_id == winner_team).unwrap();
        assert_eq!(line.completion, Some(0.5));
    }
}
