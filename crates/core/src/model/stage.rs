use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{AttachmentId, QuestionId, StageId, VideoId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StageValidationError {
    #[error("question {0} needs at least two options")]
    TooFewOptions(QuestionId),

    #[error("question {0} marks an option that does not exist as correct")]
    CorrectOptionOutOfRange(QuestionId),

    #[error("stage id {0} is used more than once")]
    DuplicateStageId(StageId),

    #[error("stage id cannot be blank")]
    BlankStageId,

    #[error("question id {0} is used more than once")]
    DuplicateQuestionId(QuestionId),
}

/// Smallest number of options a question may carry.
pub const MIN_OPTIONS: usize = 2;

//
// ─── VIDEO CONTENT ─────────────────────────────────────────────────────────────
//

/// A file attached to a video entry. `url` is the opaque reference handed back
/// by blob storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: AttachmentId,
    pub name: String,
    pub url: String,
    #[serde(alias = "type")]
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoEntry {
    pub id: VideoId,
    pub title: String,
    #[serde(default, alias = "url", skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default, alias = "files")]
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoStage {
    pub id: StageId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, alias = "duration")]
    pub duration_label: String,
    #[serde(default)]
    pub videos: Vec<VideoEntry>,
}

//
// ─── QUIZ CONTENT ──────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    /// Blank when a stored question carried no id; `TestStage` fills it in.
    #[serde(default)]
    pub id: QuestionId,
    #[serde(alias = "question")]
    pub text: String,
    pub options: Vec<String>,
    #[serde(alias = "correctAnswer")]
    pub correct_option_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl Question {
    /// Builds a question, checking the option invariants.
    ///
    /// # Errors
    ///
    /// Returns `StageValidationError` if fewer than two options are given or
    /// the correct index does not point at one of them.
    pub fn new(
        id: QuestionId,
        text: impl Into<String>,
        options: Vec<String>,
        correct_option_index: usize,
        explanation: Option<String>,
    ) -> Result<Self, StageValidationError> {
        let question = Self {
            id,
            text: text.into(),
            options,
            correct_option_index,
            explanation,
        };
        question.validate()?;
        Ok(question)
    }

    /// # Errors
    ///
    /// Returns `StageValidationError` when the option invariants do not hold.
    pub fn validate(&self) -> Result<(), StageValidationError> {
        if self.options.len() < MIN_OPTIONS {
            return Err(StageValidationError::TooFewOptions(self.id.clone()));
        }
        if self.correct_option_index >= self.options.len() {
            return Err(StageValidationError::CorrectOptionOutOfRange(
                self.id.clone(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn is_correct(&self, option_index: usize) -> bool {
        option_index == self.correct_option_index
    }

    #[must_use]
    pub fn correct_option(&self) -> Option<&str> {
        self.options
            .get(self.correct_option_index)
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "TestStageRecord")]
pub struct TestStage {
    pub id: StageId,
    pub title: String,
    pub questions: Vec<Question>,
}

/// Stored shape of a test stage. Older records keep questions without ids;
/// those get `{stage_id}-q{n}` with `n` the 1-based position.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TestStageRecord {
    id: StageId,
    title: String,
    #[serde(default)]
    questions: Vec<Question>,
}

impl From<TestStageRecord> for TestStage {
    fn from(record: TestStageRecord) -> Self {
        let TestStageRecord {
            id,
            title,
            mut questions,
        } = record;
        for (index, question) in questions.iter_mut().enumerate() {
            if question.id.as_str().trim().is_empty() {
                question.id = QuestionId::new(format!("{id}-q{}", index + 1));
            }
        }
        Self {
            id,
            title,
            questions,
        }
    }
}

impl TestStage {
    #[must_use]
    pub fn question(&self, id: &QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| &q.id == id)
    }

    #[must_use]
    pub fn contains_question(&self, id: &QuestionId) -> bool {
        self.question(id).is_some()
    }
}

//
// ─── STAGE ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Video,
    Test,
}

/// One unit of course content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Stage {
    Video(VideoStage),
    Test(TestStage),
}

impl Stage {
    #[must_use]
    pub fn id(&self) -> &StageId {
        match self {
            Stage::Video(v) => &v.id,
            Stage::Test(t) => &t.id,
        }
    }

    #[must_use]
    pub fn title(&self) -> &str {
        match self {
            Stage::Video(v) => &v.title,
            Stage::Test(t) => &t.title,
        }
    }

    #[must_use]
    pub fn kind(&self) -> StageKind {
        match self {
            Stage::Video(_) => StageKind::Video,
            Stage::Test(_) => StageKind::Test,
        }
    }

    /// Questions carried by this stage; video stages have none.
    #[must_use]
    pub fn questions(&self) -> &[Question] {
        match self {
            Stage::Video(_) => &[],
            Stage::Test(t) => &t.questions,
        }
    }

    #[must_use]
    pub fn as_test(&self) -> Option<&TestStage> {
        match self {
            Stage::Test(t) => Some(t),
            Stage::Video(_) => None,
        }
    }

    #[must_use]
    pub fn as_video(&self) -> Option<&VideoStage> {
        match self {
            Stage::Video(v) => Some(v),
            Stage::Test(_) => None,
        }
    }

    pub(crate) fn set_id(&mut self, id: StageId) {
        match self {
            Stage::Video(v) => v.id = id,
            Stage::Test(t) => t.id = id,
        }
    }

    /// Returns this stage with its id replaced.
    #[must_use]
    pub fn with_id(mut self, id: StageId) -> Self {
        self.set_id(id);
        self
    }

    /// # Errors
    ///
    /// Returns `StageValidationError` if the id is blank or a question breaks
    /// its option invariants.
    pub fn validate(&self) -> Result<(), StageValidationError> {
        if self.id().as_str().trim().is_empty() {
            return Err(StageValidationError::BlankStageId);
        }
        self.questions().iter().try_for_each(Question::validate)
    }
}

/// Validates a whole stage list: every stage valid, stage ids unique and
/// question ids unique across the course, since answers are keyed by
/// question id alone.
///
/// # Errors
///
/// Returns the first `StageValidationError` encountered.
pub fn validate_stages(stages: &[Stage]) -> Result<(), StageValidationError> {
    let mut stage_ids = HashSet::with_capacity(stages.len());
    let mut question_ids = HashSet::new();
    for stage in stages {
        stage.validate()?;
        if !stage_ids.insert(stage.id()) {
            return Err(StageValidationError::DuplicateStageId(stage.id().clone()));
        }
        for question in stage.questions() {
            if !question_ids.insert(&question.id) {
                return Err(StageValidationError::DuplicateQuestionId(
                    question.id.clone(),
                ));
            }
        }
    }
    Ok(())
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn question(id: &str, options: &[&str], correct: usize) -> Question {
        Question {
            id: QuestionId::new(id),
            text: "Pick one".into(),
            options: options.iter().map(ToString::to_string).collect(),
            correct_option_index: correct,
            explanation: None,
        }
    }

    #[test]
    fn question_new_rejects_single_option() {
        let err = Question::new(QuestionId::new("q"), "?", vec!["only".into()], 0, None)
            .unwrap_err();
        assert_eq!(err, StageValidationError::TooFewOptions(QuestionId::new("q")));
    }

    #[test]
    fn question_new_rejects_out_of_range_correct_index() {
        let err = Question::new(
            QuestionId::new("q"),
            "?",
            vec!["a".into(), "b".into()],
            2,
            None,
        )
        .unwrap_err();
        assert_eq!(
            err,
            StageValidationError::CorrectOptionOutOfRange(QuestionId::new("q"))
        );
    }

    #[test]
    fn correct_option_is_surfaced() {
        let q = question("q", &["a", "b", "c"], 1);
        assert!(q.is_correct(1));
        assert!(!q.is_correct(0));
        assert_eq!(q.correct_option(), Some("b"));
    }

    #[test]
    fn stage_serializes_with_type_tag() {
        let stage = Stage::Test(TestStage {
            id: StageId::new("t1"),
            title: "Check".into(),
            questions: vec![question("q1", &["a", "b"], 0)],
        });
        let value = serde_json::to_value(&stage).unwrap();
        assert_eq!(value["type"], "test");
        assert_eq!(value["questions"][0]["correctOptionIndex"], 0);
    }

    #[test]
    fn stage_accepts_legacy_field_names() {
        let raw = r#"[
            {"id":"1","type":"video","title":"Intro","description":"d","duration":"15 min",
             "videos":[{"id":"v1","title":"Part 1","url":"","files":[
                {"id":"f1","name":"notes.pdf","url":"blob:1","type":"application/pdf"}]}]},
            {"id":"2","type":"test","title":"Quiz","questions":[
                {"id":"q1","question":"?","options":["a","b","c"],"correctAnswer":1}]}
        ]"#;
        let stages: Vec<Stage> = serde_json::from_str(raw).unwrap();
        let video = stages[0].as_video().unwrap();
        assert_eq!(video.duration_label, "15 min");
        assert_eq!(video.videos[0].attachments[0].mime_type, "application/pdf");
        let test = stages[1].as_test().unwrap();
        assert_eq!(test.questions[0].correct_option_index, 1);
        assert!(validate_stages(&stages).is_ok());
    }

    #[test]
    fn validate_stages_rejects_duplicate_ids() {
        let a = Stage::Test(TestStage {
            id: StageId::new("same"),
            title: "A".into(),
            questions: Vec::new(),
        });
        let err = validate_stages(&[a.clone(), a]).unwrap_err();
        assert_eq!(
            err,
            StageValidationError::DuplicateStageId(StageId::new("same"))
        );
    }

    #[test]
    fn validate_stages_rejects_question_ids_shared_between_stages() {
        let stage = |id: &str| {
            Stage::Test(TestStage {
                id: StageId::new(id),
                title: id.into(),
                questions: vec![question("q", &["a", "b"], 1)],
            })
        };
        let err = validate_stages(&[stage("t1"), stage("t2")]).unwrap_err();
        assert_eq!(
            err,
            StageValidationError::DuplicateQuestionId(QuestionId::new("q"))
        );
    }

    #[test]
    fn stored_questions_without_ids_get_positional_ids() {
        let raw = r#"[
            {"id":"7","type":"test","title":"Authored","questions":[
                {"question":"First?","options":["a","b"],"correctAnswer":0,"explanation":""},
                {"question":"Second?","options":["a","b","c"],"correctAnswer":2}]},
            {"id":"8","type":"test","title":"Kept","questions":[
                {"id":"mine","question":"Third?","options":["a","b"],"correctAnswer":1}]}
        ]"#;
        let stages: Vec<Stage> = serde_json::from_str(raw).unwrap();
        let ids: Vec<&str> = stages
            .iter()
            .flat_map(Stage::questions)
            .map(|q| q.id.as_str())
            .collect();
        assert_eq!(ids, vec!["7-q1", "7-q2", "mine"]);
        assert!(validate_stages(&stages).is_ok());

        let again: Vec<Stage> =
            serde_json::from_str(&serde_json::to_string(&stages).unwrap()).unwrap();
        assert_eq!(again, stages);
    }

    #[test]
    fn with_id_preserves_kind() {
        let stage = Stage::Test(TestStage {
            id: StageId::new("old"),
            title: "A".into(),
            questions: Vec::new(),
        })
        .with_id(StageId::new("new"));
        assert_eq!(stage.id(), &StageId::new("new"));
        assert_eq!(stage.kind(), StageKind::Test);
    }
}
