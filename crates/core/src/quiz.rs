//! Answer state for the active test stage and course-wide scoring.

use crate::model::{AnswerMap, Question, QuestionId, Stage, TestStage};

/// What a revealed question discloses to the learner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerFeedback {
    pub question_id: QuestionId,
    pub selected: usize,
    pub correct_index: usize,
    pub correct_option: String,
    pub is_correct: bool,
    pub explanation: Option<String>,
}

/// In-progress answers plus the question cursor of the displayed test stage.
///
/// Every operation takes the active stage as an argument; `None` means the
/// learner is not on a test stage and the call is ignored. Answers are keyed
/// by question id and survive stage navigation, while the cursor and the
/// reveal flag belong to the displayed stage only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuizSession {
    answers: AnswerMap,
    current_question_index: usize,
    revealed: bool,
}

impl QuizSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_answers(answers: AnswerMap) -> Self {
        Self {
            answers,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn answers(&self) -> &AnswerMap {
        &self.answers
    }

    #[must_use]
    pub fn current_question_index(&self) -> usize {
        self.current_question_index
    }

    #[must_use]
    pub fn revealed(&self) -> bool {
        self.revealed
    }

    #[must_use]
    pub fn answer_for(&self, question: &QuestionId) -> Option<usize> {
        self.answers.get(question).copied()
    }

    #[must_use]
    pub fn current_question<'a>(&self, active: Option<&'a TestStage>) -> Option<&'a Question> {
        active?.questions.get(self.current_question_index)
    }

    /// Back to the first question, hidden. Called whenever the displayed
    /// stage changes.
    pub fn reset_cursor(&mut self) {
        self.current_question_index = 0;
        self.revealed = false;
    }

    /// Records an answer for a question of the active stage.
    ///
    /// Ignored when the question belongs elsewhere or the option does not
    /// exist. Changing the answer to the current question hides it again.
    pub fn submit_answer(
        &mut self,
        active: Option<&TestStage>,
        question_id: &QuestionId,
        option_index: usize,
    ) -> bool {
        let Some(question) = active.and_then(|stage| stage.question(question_id)) else {
            return false;
        };
        if option_index >= question.options.len() {
            return false;
        }
        let previous = self.answers.insert(question_id.clone(), option_index);
        let on_current = self
            .current_question(active)
            .is_some_and(|q| &q.id == question_id);
        if on_current && previous != Some(option_index) {
            self.revealed = false;
        }
        true
    }

    /// Discloses the result for the current question, once it has an answer.
    pub fn reveal(&mut self, active: Option<&TestStage>) -> bool {
        let Some(question) = self.current_question(active) else {
            return false;
        };
        if !self.answers.contains_key(&question.id) || self.revealed {
            return false;
        }
        self.revealed = true;
        true
    }

    pub fn next_question(&mut self, active: Option<&TestStage>) -> bool {
        let Some(stage) = active else {
            return false;
        };
        if self.current_question_index + 1 >= stage.questions.len() {
            return false;
        }
        self.current_question_index += 1;
        self.revealed = false;
        true
    }

    pub fn prev_question(&mut self, active: Option<&TestStage>) -> bool {
        if active.is_none() || self.current_question_index == 0 {
            return false;
        }
        self.current_question_index -= 1;
        self.revealed = false;
        true
    }

    /// Result of the current question, available only after `reveal`.
    #[must_use]
    pub fn feedback(&self, active: Option<&TestStage>) -> Option<AnswerFeedback> {
        if !self.revealed {
            return None;
        }
        let question = self.current_question(active)?;
        let selected = self.answer_for(&question.id)?;
        Some(AnswerFeedback {
            question_id: question.id.clone(),
            selected,
            correct_index: question.correct_option_index,
            correct_option: question.correct_option().unwrap_or_default().to_owned(),
            is_correct: question.is_correct(selected),
            explanation: question.explanation.clone(),
        })
    }

    /// Forgets the active stage's answers so it can be taken again.
    pub fn retake(&mut self, active: Option<&TestStage>) -> bool {
        let Some(stage) = active else {
            return false;
        };
        for question in &stage.questions {
            self.answers.remove(&question.id);
        }
        self.reset_cursor();
        true
    }

    /// Drops answers whose question is no longer part of `stages` or whose
    /// option no longer exists.
    pub fn retain_known(&mut self, stages: &[Stage]) {
        self.answers.retain(|id, selected| {
            stages.iter().any(|stage| {
                stage
                    .questions()
                    .iter()
                    .any(|q| &q.id == id && *selected < q.options.len())
            })
        });
    }

    /// Keeps the cursor inside the active stage after its questions changed.
    pub fn clamp_cursor(&mut self, active: Option<&TestStage>) {
        let len = active.map_or(0, |stage| stage.questions.len());
        if self.current_question_index >= len.max(1) {
            self.reset_cursor();
        }
    }
}

/// `(correct, total)` for one stage's questions.
#[must_use]
pub fn stage_result(stage: &Stage, answers: &AnswerMap) -> (usize, usize) {
    let questions = stage.questions();
    let correct = questions
        .iter()
        .filter(|q| answers.get(&q.id).is_some_and(|a| q.is_correct(*a)))
        .count();
    (correct, questions.len())
}

/// Percentage of correct answers over every question in the course, rounded
/// half up. A course without questions scores 100.
#[must_use]
pub fn score(stages: &[Stage], answers: &AnswerMap) -> u32 {
    let (correct, total) = stages
        .iter()
        .map(|stage| stage_result(stage, answers))
        .fold((0, 0), |(c, t), (sc, st)| (c + sc, t + st));
    if total == 0 {
        return 100;
    }
    let rounded = (correct * 200 + total) / (total * 2);
    u32::try_from(rounded).unwrap_or(100)
}
