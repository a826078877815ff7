use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::QuestionEntity,
    dto::{
        format_system_time,
        validation::{validate_media_reference, validate_not_blank},
    },
    state::{
        question::{Answer, Question, QuestionKind, QuestionPhase, QuestionSpec, RecordedAnswer},
        timer::{Timer, TimerStatus},
    },
};

/// Question supplied inline in a game or saved to the bank.
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct QuestionInput {
    /// Keeps a caller-chosen id; a fresh one is assigned otherwise.
    #[serde(default)]
    pub id: Option<Uuid>,
    #[validate(length(max = 1000), custom(function = "validate_not_blank"))]
    pub prompt: String,
    #[serde(default)]
    #[validate(custom(function = "validate_media_reference"))]
    pub media: Option<String>,
    /// Reward overriding the round default.
    #[serde(default)]
    #[validate(range(max = 10_000))]
    pub points: Option<u32>,
    /// Correct-answer specification, tagged by `type`.
    #[schema(value_type = Object)]
    pub spec: QuestionSpec,
}

impl QuestionInput {
    /// Build an idle question, checking that the specification is consistent.
    pub fn into_question(self) -> Result<Question, String> {
        self.spec.validate()?;
        Ok(Question::new(
            self.id.unwrap_or_else(Uuid::new_v4),
            self.prompt.trim().to_owned(),
            self.media,
            self.points,
            self.spec,
        ))
    }
}

/// Bank question as stored, solution included.
#[derive(Debug, Serialize, ToSchema)]
pub struct BankQuestionResponse {
    pub id: Uuid,
    #[schema(value_type = String)]
    pub kind: QuestionKind,
    pub prompt: String,
    pub media: Option<String>,
    pub points: Option<u32>,
    #[schema(value_type = Object)]
    pub spec: QuestionSpec,
}

impl From<QuestionEntity> for BankQuestionResponse {
    fn from(value: QuestionEntity) -> Self {
        Self {
            id: value.id,
            kind: value.kind(),
            prompt: value.prompt,
            media: value.media,
            points: value.points,
            spec: value.spec,
        }
    }
}

/// Countdown state of a question.
#[derive(Debug, Serialize, ToSchema)]
pub struct TimerView {
    #[schema(value_type = String)]
    pub status: TimerStatus,
    pub duration_ms: u64,
    /// Time left when the response was built.
    pub remaining_ms: u64,
    pub timestamp: String,
}

impl TimerView {
    fn new(timer: &Timer, now: SystemTime) -> Self {
        Self {
            status: timer.status,
            duration_ms: timer.duration.as_millis() as u64,
            remaining_ms: timer.remaining(now).as_millis() as u64,
            timestamp: format_system_time(timer.timestamp),
        }
    }
}

/// Answer as shown to clients. Content and grading stay hidden until the question is
/// resolved; open questions only show who answered and when.
#[derive(Debug, Serialize, ToSchema)]
pub struct AnswerView {
    pub player_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub answer: Option<Answer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bonus: Option<bool>,
    pub submitted_at: String,
}

impl AnswerView {
    fn new(recorded: &RecordedAnswer, resolved: bool) -> Self {
        Self {
            player_id: recorded.player_id,
            answer: resolved.then(|| recorded.answer.clone()),
            points: resolved.then_some(recorded.points),
            correct: resolved.then_some(recorded.correct),
            bonus: resolved.then_some(recorded.bonus),
            submitted_at: format_system_time(recorded.submitted_at),
        }
    }
}

/// Question as played in a game. Content is withheld until the question starts and the
/// solution until it is resolved.
#[derive(Debug, Serialize, ToSchema)]
pub struct QuestionView {
    pub id: Uuid,
    #[schema(value_type = String)]
    pub kind: QuestionKind,
    #[schema(value_type = String)]
    pub phase: QuestionPhase,
    pub prompt: Option<String>,
    pub media: Option<String>,
    pub points: Option<u32>,
    /// Emoji sequence of emoji questions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emojis: Option<String>,
    /// Fixed column of matching questions.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub left: Vec<String>,
    /// Choices or items in display order; answers refer to these positions.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<String>,
    /// Clues revealed so far.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub clues: Vec<String>,
    /// Number of labels expected by labelling questions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slots: Option<usize>,
    /// Positions in `items` offered by the nagui `duo` option, in ascending order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duo: Option<[usize; 2]>,
    pub timer: Option<TimerView>,
    pub buzz_queue: Vec<Uuid>,
    pub answers: Vec<AnswerView>,
    pub winner: Option<Uuid>,
    pub bonus_holder: Option<Uuid>,
    #[schema(value_type = Option<Object>)]
    pub solution: Option<QuestionSpec>,
}

impl QuestionView {
    /// Project a question at `now`.
    pub fn new(question: &Question, now: SystemTime) -> Self {
        let runtime = &question.runtime;
        let started = runtime.phase != QuestionPhase::Idle;
        let resolved = runtime.phase == QuestionPhase::Resolved;

        let mut view = Self {
            id: question.id,
            kind: question.kind(),
            phase: runtime.phase,
            prompt: started.then(|| question.prompt.clone()),
            media: started.then(|| question.media.clone()).flatten(),
            points: question.points,
            emojis: None,
            left: Vec::new(),
            items: Vec::new(),
            clues: Vec::new(),
            slots: None,
            duo: None,
            timer: runtime.timer.as_ref().map(|timer| TimerView::new(timer, now)),
            buzz_queue: runtime.buzz_queue.clone(),
            answers: runtime
                .answers
                .iter()
                .map(|recorded| AnswerView::new(recorded, resolved))
                .collect(),
            winner: runtime.winner,
            bonus_holder: runtime.bonus_holder.filter(|_| resolved),
            solution: resolved.then(|| question.spec.clone()),
        };

        if !started {
            return view;
        }

        let displayed = |values: &[String]| -> Vec<String> {
            if runtime.display_order.is_empty() {
                return values.to_vec();
            }
            runtime
                .display_order
                .iter()
                .filter_map(|index| values.get(*index).cloned())
                .collect()
        };

        match &question.spec {
            QuestionSpec::Emoji { emojis, .. } => view.emojis = Some(emojis.clone()),
            QuestionSpec::Nagui {
                choices,
                answer_index,
                duo_index,
            } => {
                view.items = choices.clone();
                view.duo = Some([
                    (*answer_index).min(*duo_index),
                    (*answer_index).max(*duo_index),
                ]);
            }
            QuestionSpec::Labelling { labels } => view.slots = Some(labels.len()),
            QuestionSpec::Matching { left, right } => {
                view.left = left.clone();
                view.items = displayed(right);
            }
            QuestionSpec::OddOneOut { items, .. } | QuestionSpec::Reordering { items } => {
                view.items = displayed(items);
            }
            QuestionSpec::ProgressiveClues { clues, .. } => {
                view.clues = clues.iter().take(runtime.revealed_clues).cloned().collect();
            }
            QuestionSpec::Basic { .. }
            | QuestionSpec::Blindtest { .. }
            | QuestionSpec::Image { .. }
            | QuestionSpec::Enumeration { .. } => {}
        }
        view
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn clues_question() -> Question {
        Question::new(
            Uuid::new_v4(),
            "Who am I?".into(),
            None,
            None,
            QuestionSpec::ProgressiveClues {
                clues: vec!["French".into(), "Emperor".into(), "Short".into()],
                answers: vec!["Napoleon".into()],
            },
        )
    }

    #[test]
    fn idle_questions_hide_their_content() {
        let view = QuestionView::new(&clues_question(), SystemTime::UNIX_EPOCH);
        assert!(view.prompt.is_none());
        assert!(view.clues.is_empty());
        assert!(view.solution.is_none());
    }

    #[test]
    fn started_questions_show_revealed_clues_only() {
        let mut question = clues_question();
        let now = SystemTime::UNIX_EPOCH;
        let mut timer = Timer::new(Duration::from_secs(35), now);
        timer.start(Duration::from_secs(35), now).unwrap();
        question.start(timer);

        let view = QuestionView::new(&question, now + Duration::from_secs(10));
        assert_eq!(view.prompt.as_deref(), Some("Who am I?"));
        assert_eq!(view.clues, vec!["French".to_string()]);
        assert_eq!(view.timer.as_ref().unwrap().remaining_ms, 25_000);
        assert!(view.solution.is_none());

        question.resolve(now + Duration::from_secs(11));
        let view = QuestionView::new(&question, now + Duration::from_secs(12));
        assert!(view.solution.is_some());
        assert_eq!(view.timer.unwrap().remaining_ms, 0);
    }

    #[test]
    fn shuffled_items_follow_the_display_order() {
        let mut question = Question::new(
            Uuid::new_v4(),
            "Sort".into(),
            None,
            None,
            QuestionSpec::Reordering {
                items: vec!["a".into(), "b".into(), "c".into()],
            },
        );
        let now = SystemTime::UNIX_EPOCH;
        question.start(Timer::new(Duration::from_secs(10), now));
        question.runtime.display_order = vec![2, 0, 1];

        let view = QuestionView::new(&question, now);
        assert_eq!(view.items, vec!["c", "a", "b"]);
    }

    fn started(spec: QuestionSpec) -> Question {
        let mut question = Question::new(Uuid::new_v4(), "Capital?".into(), None, None, spec);
        let now = SystemTime::UNIX_EPOCH;
        question.start(Timer::new(Duration::from_secs(35), now));
        question
    }

    #[test]
    fn open_questions_hide_answer_content_and_grading() {
        let mut question = started(QuestionSpec::Basic {
            answers: vec!["Paris".into()],
        });
        let player_id = Uuid::new_v4();
        question.runtime.bonus_holder = Some(player_id);
        question.runtime.answers.push(RecordedAnswer {
            player_id,
            answer: Answer::Text("Paris".into()),
            points: 130,
            correct: true,
            bonus: true,
            submitted_at: SystemTime::UNIX_EPOCH + Duration::from_secs(8),
        });

        let view = QuestionView::new(&question, SystemTime::UNIX_EPOCH + Duration::from_secs(9));
        let json = serde_json::to_value(&view).unwrap();
        let answer = &json["answers"][0];
        assert_eq!(answer["player_id"], serde_json::json!(player_id));
        assert!(answer.get("submitted_at").is_some());
        for hidden in ["answer", "correct", "points", "bonus"] {
            assert!(answer.get(hidden).is_none(), "{hidden} leaked");
        }
        assert!(json["bonus_holder"].is_null());
        assert!(!json.to_string().contains("Paris"));

        question.resolve(SystemTime::UNIX_EPOCH + Duration::from_secs(10));
        let view = QuestionView::new(&question, SystemTime::UNIX_EPOCH + Duration::from_secs(11));
        let answer = &view.answers[0];
        assert_eq!(answer.points, Some(130));
        assert_eq!(answer.correct, Some(true));
        assert_eq!(view.bonus_holder, Some(player_id));
    }

    #[test]
    fn nagui_views_offer_the_duo_pair_without_the_answer() {
        let spec = QuestionSpec::Nagui {
            choices: vec!["Rome".into(), "Madrid".into(), "Lisbon".into(), "Oslo".into()],
            answer_index: 3,
            duo_index: 1,
        };
        let idle = Question::new(Uuid::new_v4(), "Capital?".into(), None, None, spec.clone());
        assert!(QuestionView::new(&idle, SystemTime::UNIX_EPOCH).duo.is_none());

        let view = QuestionView::new(&started(spec), SystemTime::UNIX_EPOCH);
        assert_eq!(view.duo, Some([1, 3]));
        assert_eq!(view.items.len(), 4);
        assert!(view.solution.is_none());
    }
}
