//! Questions, their correct-answer specification and answer grading.

use std::time::SystemTime;

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};
use uuid::Uuid;

use crate::state::timer::Timer;

/// Question types. A round holds questions of a single kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    /// Free text answer.
    Basic,
    /// Identify a music extract.
    Blindtest,
    /// Decode a sequence of emojis.
    Emoji,
    /// Identify a picture.
    Image,
    /// Multiple choice with hide / square / duo options.
    Nagui,
    /// List as many expected items as possible.
    Enumeration,
    /// Put the right label on each slot of a picture.
    Labelling,
    /// Pair every left item with its right counterpart.
    Matching,
    /// Pick the item that does not belong.
    OddOneOut,
    /// Guess with as few clues as possible.
    ProgressiveClues,
    /// Put items back in order.
    Reordering,
}

/// Correct-answer specification, one variant per [`QuestionKind`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionSpec {
    /// Accepted answers for a basic question.
    Basic {
        /// Accepted spellings.
        answers: Vec<String>,
    },
    /// Accepted answers for a blind test extract.
    Blindtest {
        /// Accepted spellings.
        answers: Vec<String>,
    },
    /// Emoji riddle.
    Emoji {
        /// Emoji sequence shown to players.
        emojis: String,
        /// Accepted spellings.
        answers: Vec<String>,
    },
    /// Picture to identify.
    Image {
        /// Accepted spellings.
        answers: Vec<String>,
    },
    /// Multiple choice question.
    Nagui {
        /// Every proposed choice.
        choices: Vec<String>,
        /// Index of the correct choice.
        answer_index: usize,
        /// Index of the decoy offered with the `duo` option.
        duo_index: usize,
    },
    /// Items to enumerate.
    Enumeration {
        /// Expected items.
        answers: Vec<String>,
    },
    /// Label expected on each slot.
    Labelling {
        /// Expected label per slot, in slot order.
        labels: Vec<String>,
    },
    /// Pairs to rebuild; `left[i]` matches `right[i]`.
    Matching {
        /// Left column.
        left: Vec<String>,
        /// Right column, shuffled for display.
        right: Vec<String>,
    },
    /// Items with one intruder.
    OddOneOut {
        /// Items, shuffled for display.
        items: Vec<String>,
        /// Index of the intruder in `items`.
        odd_index: usize,
    },
    /// Clues revealed one by one.
    ProgressiveClues {
        /// Clues in reveal order.
        clues: Vec<String>,
        /// Accepted spellings.
        answers: Vec<String>,
    },
    /// Items in their correct order.
    Reordering {
        /// Items in the expected order, shuffled for display.
        items: Vec<String>,
    },
}

/// Nagui answering option, trading choice comfort for points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NaguiOption {
    /// Answer without seeing the choices.
    Hide,
    /// Pick among all the choices.
    Square,
    /// Pick between the correct choice and a decoy.
    Duo,
}

/// Player submission. Its shape must match the question kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Answer {
    /// Free text.
    Text(String),
    /// Display position of a single choice.
    Choice(usize),
    /// Nagui submission.
    Nagui {
        /// Option picked by the player.
        option: NaguiOption,
        /// Choice index for `square` and `duo`.
        #[serde(default)]
        choice: Option<usize>,
        /// Free text for `hide`.
        #[serde(default)]
        text: Option<String>,
    },
    /// Free text items (enumeration, labelling).
    Items(Vec<String>),
    /// Display positions (matching, reordering).
    Indices(Vec<usize>),
}

/// Runtime phase of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionPhase {
    /// Not started yet.
    #[default]
    Idle,
    /// Open for buzzes or answers.
    Active,
    /// A buzzer holds focus and must answer.
    AwaitingAnswer,
    /// Terminal.
    Resolved,
}

/// Graded submission recorded on the question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedAnswer {
    /// Player who answered.
    pub player_id: Uuid,
    /// Submission as received.
    pub answer: Answer,
    /// Points credited, bonus included.
    pub points: u32,
    /// Whether the submission was graded correct.
    pub correct: bool,
    /// Whether the first-correct bonus was awarded with this answer.
    #[serde(default)]
    pub bonus: bool,
    /// When the answer was committed.
    pub submitted_at: SystemTime,
}

/// Mutable state of a question while it is played.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QuestionRuntime {
    /// Lifecycle phase.
    pub phase: QuestionPhase,
    /// Answer window, present once started.
    pub timer: Option<Timer>,
    /// Buzzers in commit order; the head holds focus.
    pub buzz_queue: Vec<Uuid>,
    /// Graded submissions in commit order.
    pub answers: Vec<RecordedAnswer>,
    /// Player who resolved the question with a correct answer.
    pub winner: Option<Uuid>,
    /// Player who received the first-correct bonus.
    pub bonus_holder: Option<Uuid>,
    /// Number of clues revealed so far.
    pub revealed_clues: usize,
    /// Display position to original index, for shuffled kinds.
    pub display_order: Vec<usize>,
    /// When the question was started.
    pub started_at: Option<SystemTime>,
    /// When the question was resolved.
    pub resolved_at: Option<SystemTime>,
}

/// A question as played inside a round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    /// Stable identifier.
    pub id: Uuid,
    /// Text shown to players.
    pub prompt: String,
    /// Opaque media reference.
    pub media: Option<String>,
    /// Per-question reward overriding the round default.
    pub points: Option<u32>,
    /// Correct-answer specification.
    pub spec: QuestionSpec,
    /// Runtime state.
    pub runtime: QuestionRuntime,
}

/// Submission does not fit the question kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct AnswerFormatError(pub String);

/// Outcome of grading one submission, bonus excluded for riddle-family kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grade {
    /// Points earned.
    pub points: u32,
    /// Whether the submission counts as correct.
    pub correct: bool,
}

impl Grade {
    fn from_points(points: u32) -> Self {
        Self {
            points,
            correct: points > 0,
        }
    }
}

/// Scoring inputs resolved from the round for one question.
#[derive(Debug, Clone, Copy)]
pub struct Rewards {
    /// Base reward for the question.
    pub reward: u32,
    /// Bonus reward of the round.
    pub bonus: u32,
    /// Points lost per extra revealed clue.
    pub clue_penalty: u32,
}

impl QuestionSpec {
    /// Kind this specification belongs to.
    pub fn kind(&self) -> QuestionKind {
        match self {
            QuestionSpec::Basic { .. } => QuestionKind::Basic,
            QuestionSpec::Blindtest { .. } => QuestionKind::Blindtest,
            QuestionSpec::Emoji { .. } => QuestionKind::Emoji,
            QuestionSpec::Image { .. } => QuestionKind::Image,
            QuestionSpec::Nagui { .. } => QuestionKind::Nagui,
            QuestionSpec::Enumeration { .. } => QuestionKind::Enumeration,
            QuestionSpec::Labelling { .. } => QuestionKind::Labelling,
            QuestionSpec::Matching { .. } => QuestionKind::Matching,
            QuestionSpec::OddOneOut { .. } => QuestionKind::OddOneOut,
            QuestionSpec::ProgressiveClues { .. } => QuestionKind::ProgressiveClues,
            QuestionSpec::Reordering { .. } => QuestionKind::Reordering,
        }
    }

    /// Check that the specification is internally consistent.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            QuestionSpec::Basic { answers }
            | QuestionSpec::Blindtest { answers }
            | QuestionSpec::Image { answers }
            | QuestionSpec::Enumeration { answers } => non_blank("answers", answers),
            QuestionSpec::Emoji { emojis, answers } => {
                if emojis.trim().is_empty() {
                    return Err("emojis must not be empty".into());
                }
                non_blank("answers", answers)
            }
            QuestionSpec::Nagui {
                choices,
                answer_index,
                duo_index,
            } => {
                if choices.len() < 2 {
                    return Err("nagui needs at least two choices".into());
                }
                non_blank("choices", choices)?;
                if *answer_index >= choices.len() || *duo_index >= choices.len() {
                    return Err("nagui answer or duo index out of range".into());
                }
                if answer_index == duo_index {
                    return Err("nagui duo decoy must differ from the answer".into());
                }
                Ok(())
            }
            QuestionSpec::Labelling { labels } => non_blank("labels", labels),
            QuestionSpec::Matching { left, right } => {
                if left.len() < 2 || left.len() != right.len() {
                    return Err("matching needs two columns of equal length (at least 2)".into());
                }
                non_blank("left", left)?;
                non_blank("right", right)
            }
            QuestionSpec::OddOneOut { items, odd_index } => {
                if items.len() < 3 {
                    return Err("odd one out needs at least three items".into());
                }
                if *odd_index >= items.len() {
                    return Err("odd one out index out of range".into());
                }
                non_blank("items", items)
            }
            QuestionSpec::ProgressiveClues { clues, answers } => {
                non_blank("clues", clues)?;
                non_blank("answers", answers)
            }
            QuestionSpec::Reordering { items } => {
                if items.len() < 2 {
                    return Err("reordering needs at least two items".into());
                }
                non_blank("items", items)
            }
        }
    }

    /// Number of items shuffled for display, if the kind shuffles.
    fn shuffled_len(&self) -> Option<usize> {
        match self {
            QuestionSpec::Matching { right, .. } => Some(right.len()),
            QuestionSpec::OddOneOut { items, .. } => Some(items.len()),
            QuestionSpec::Reordering { items } => Some(items.len()),
            _ => None,
        }
    }
}

fn non_blank(field: &str, values: &[String]) -> Result<(), String> {
    if values.is_empty() {
        return Err(format!("{field} must not be empty"));
    }
    if values.iter().any(|value| value.trim().is_empty()) {
        return Err(format!("{field} must not contain blank entries"));
    }
    Ok(())
}

impl Question {
    /// Build an idle question.
    pub fn new(
        id: Uuid,
        prompt: String,
        media: Option<String>,
        points: Option<u32>,
        spec: QuestionSpec,
    ) -> Self {
        Self {
            id,
            prompt,
            media,
            points,
            spec,
            runtime: QuestionRuntime::default(),
        }
    }

    /// Kind of the question.
    pub fn kind(&self) -> QuestionKind {
        self.spec.kind()
    }

    /// Open the question: arm the timer, shuffle the display order and reveal the first clue.
    pub fn start(&mut self, timer: Timer) {
        let display_order = match self.spec.shuffled_len() {
            Some(len) => {
                let mut order: Vec<usize> = (0..len).collect();
                order.shuffle(&mut rand::rng());
                order
            }
            None => Vec::new(),
        };
        let revealed_clues = match self.spec {
            QuestionSpec::ProgressiveClues { .. } => 1,
            _ => 0,
        };
        let started_at = timer.timestamp;

        self.runtime = QuestionRuntime {
            phase: QuestionPhase::Active,
            timer: Some(timer),
            revealed_clues,
            display_order,
            started_at: Some(started_at),
            ..QuestionRuntime::default()
        };
    }

    /// Whether buzzes and answers are still being taken.
    pub fn is_open(&self) -> bool {
        matches!(
            self.runtime.phase,
            QuestionPhase::Active | QuestionPhase::AwaitingAnswer
        )
    }

    /// Player currently holding focus.
    pub fn focused_player(&self) -> Option<Uuid> {
        self.runtime.buzz_queue.first().copied()
    }

    /// Recorded submission of a player, if any.
    pub fn answer_of(&self, player_id: Uuid) -> Option<&RecordedAnswer> {
        self.runtime
            .answers
            .iter()
            .find(|recorded| recorded.player_id == player_id)
    }

    /// Mark the question resolved and end its timer.
    pub fn resolve(&mut self, now: SystemTime) {
        self.runtime.phase = QuestionPhase::Resolved;
        self.runtime.resolved_at = Some(now);
        if let Some(timer) = self.runtime.timer.as_mut() {
            timer.expire(now);
        }
    }

    /// Original index behind a display position.
    fn original_index(&self, position: usize) -> Option<usize> {
        if self.runtime.display_order.is_empty() {
            return Some(position);
        }
        self.runtime.display_order.get(position).copied()
    }

    /// Grade a submission against the specification.
    pub fn grade(&self, answer: &Answer, rewards: Rewards) -> Result<Grade, AnswerFormatError> {
        let Rewards {
            reward,
            bonus,
            clue_penalty,
        } = rewards;

        match (&self.spec, answer) {
            (
                QuestionSpec::Basic { answers }
                | QuestionSpec::Blindtest { answers }
                | QuestionSpec::Emoji { answers, .. }
                | QuestionSpec::Image { answers },
                Answer::Text(text),
            ) => Ok(Grade::from_points(if matches_any(text, answers) {
                reward
            } else {
                0
            })),
            (QuestionSpec::ProgressiveClues { answers, .. }, Answer::Text(text)) => {
                if !matches_any(text, answers) {
                    return Ok(Grade::from_points(0));
                }
                let extra_clues = self.runtime.revealed_clues.saturating_sub(1) as u32;
                let penalty = clue_penalty.saturating_mul(extra_clues);
                Ok(Grade::from_points(
                    (reward + bonus).saturating_sub(penalty),
                ))
            }
            (
                QuestionSpec::Nagui {
                    choices,
                    answer_index,
                    duo_index,
                },
                Answer::Nagui {
                    option,
                    choice,
                    text,
                },
            ) => grade_nagui(
                choices,
                *answer_index,
                *duo_index,
                *option,
                *choice,
                text.as_deref(),
                reward,
                bonus,
            ),
            (QuestionSpec::Enumeration { answers }, Answer::Items(items)) => {
                let found = answers
                    .iter()
                    .filter(|expected| {
                        let expected = normalize_answer(expected);
                        items.iter().any(|item| normalize_answer(item) == expected)
                    })
                    .count();
                let mut points = proportional(reward, found, answers.len());
                if found == answers.len() {
                    points += bonus;
                }
                Ok(Grade::from_points(points))
            }
            (QuestionSpec::Labelling { labels }, Answer::Items(items)) => {
                if items.len() != labels.len() {
                    return Err(AnswerFormatError(format!(
                        "expected {} labels, got {}",
                        labels.len(),
                        items.len()
                    )));
                }
                let placed = labels
                    .iter()
                    .zip(items)
                    .filter(|(label, item)| normalize_answer(label) == normalize_answer(item))
                    .count();
                Ok(Grade::from_points(proportional(reward, placed, labels.len())))
            }
            (QuestionSpec::Matching { left, right }, Answer::Indices(indices)) => {
                if indices.len() != left.len() {
                    return Err(AnswerFormatError(format!(
                        "expected {} pairs, got {}",
                        left.len(),
                        indices.len()
                    )));
                }
                let mut matched = 0;
                for (left_index, position) in indices.iter().enumerate() {
                    if *position >= right.len() {
                        return Err(AnswerFormatError(format!(
                            "right position {position} out of range"
                        )));
                    }
                    if self.original_index(*position) == Some(left_index) {
                        matched += 1;
                    }
                }
                Ok(Grade::from_points(proportional(reward, matched, left.len())))
            }
            (QuestionSpec::OddOneOut { items, odd_index }, Answer::Choice(position)) => {
                if *position >= items.len() {
                    return Err(AnswerFormatError(format!(
                        "choice {position} out of range"
                    )));
                }
                let odd = self.original_index(*position) == Some(*odd_index);
                Ok(Grade::from_points(if odd { reward } else { 0 }))
            }
            (QuestionSpec::Reordering { items }, Answer::Indices(positions)) => {
                let mut seen = vec![false; items.len()];
                if positions.len() != items.len() {
                    return Err(AnswerFormatError(format!(
                        "expected a permutation of {} items",
                        items.len()
                    )));
                }
                for position in positions {
                    match seen.get_mut(*position) {
                        Some(slot) if !*slot => *slot = true,
                        _ => {
                            return Err(AnswerFormatError(
                                "answer is not a permutation of the displayed items".into(),
                            ));
                        }
                    }
                }
                let in_place = positions
                    .iter()
                    .enumerate()
                    .filter(|(slot, position)| self.original_index(**position) == Some(*slot))
                    .count();
                Ok(Grade::from_points(proportional(reward, in_place, items.len())))
            }
            (spec, answer) => Err(AnswerFormatError(format!(
                "{} answer does not fit a {:?} question",
                answer.shape(),
                spec.kind()
            ))),
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn grade_nagui(
    choices: &[String],
    answer_index: usize,
    duo_index: usize,
    option: NaguiOption,
    choice: Option<usize>,
    text: Option<&str>,
    reward: u32,
    bonus: u32,
) -> Result<Grade, AnswerFormatError> {
    match option {
        NaguiOption::Hide => {
            let text =
                text.ok_or_else(|| AnswerFormatError("hide option requires a text".into()))?;
            let correct = choices
                .get(answer_index)
                .is_some_and(|expected| normalize_answer(expected) == normalize_answer(text));
            Ok(Grade::from_points(if correct { reward + bonus } else { 0 }))
        }
        NaguiOption::Square => {
            let choice =
                choice.ok_or_else(|| AnswerFormatError("square option requires a choice".into()))?;
            if choice >= choices.len() {
                return Err(AnswerFormatError(format!("choice {choice} out of range")));
            }
            Ok(Grade::from_points(if choice == answer_index {
                reward
            } else {
                0
            }))
        }
        NaguiOption::Duo => {
            let choice =
                choice.ok_or_else(|| AnswerFormatError("duo option requires a choice".into()))?;
            if choice != answer_index && choice != duo_index {
                return Err(AnswerFormatError(format!(
                    "choice {choice} is not one of the duo choices"
                )));
            }
            Ok(Grade::from_points(if choice == answer_index {
                reward / 2
            } else {
                0
            }))
        }
    }
}

impl Answer {
    fn shape(&self) -> &'static str {
        match self {
            Answer::Text(_) => "text",
            Answer::Choice(_) => "choice",
            Answer::Nagui { .. } => "nagui",
            Answer::Items(_) => "items",
            Answer::Indices(_) => "indices",
        }
    }
}

fn proportional(reward: u32, hits: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    (u64::from(reward) * hits as u64 / total as u64) as u32
}

fn matches_any(text: &str, accepted: &[String]) -> bool {
    let text = normalize_answer(text);
    !text.is_empty()
        && accepted
            .iter()
            .any(|candidate| normalize_answer(candidate) == text)
}

/// Fold a free-text answer for comparison: accents stripped, lowercase, punctuation
/// dropped and whitespace collapsed.
pub fn normalize_answer(raw: &str) -> String {
    let folded: String = raw
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}
