use crate::model::ids::{AttachmentId, IdGenerator, QuestionId, StageId, VideoId};
use crate::model::stage::{
    Attachment, MIN_OPTIONS, Question, Stage, StageKind, StageValidationError, TestStage,
    VideoEntry, VideoStage,
};

pub const DEFAULT_VIDEO_STAGE_TITLE: &str = "New stage";
pub const DEFAULT_VIDEO_STAGE_DESCRIPTION: &str = "Stage description";
pub const DEFAULT_DURATION_LABEL: &str = "15 min";
pub const DEFAULT_TEST_STAGE_TITLE: &str = "New test";

/// Options a freshly added question starts with.
const NEW_QUESTION_OPTIONS: usize = 3;

//
// ─── VIDEO DRAFT ───────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoEntryDraft {
    pub id: VideoId,
    pub title: String,
    pub source_url: Option<String>,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VideoStageDraft {
    pub title: String,
    pub description: String,
    pub duration_label: String,
    pub videos: Vec<VideoEntryDraft>,
}

impl VideoStageDraft {
    /// A blank draft with one untitled-numbered video slot.
    pub fn blank(ids: &mut IdGenerator) -> Self {
        let mut draft = Self::default();
        draft.add_video(ids);
        draft
    }

    /// Appends a video entry titled after its position and returns its id.
    pub fn add_video(&mut self, ids: &mut IdGenerator) -> VideoId {
        let id = ids.video_id();
        self.videos.push(VideoEntryDraft {
            id: id.clone(),
            title: format!("Video {}", self.videos.len() + 1),
            source_url: None,
            attachments: Vec::new(),
        });
        id
    }

    pub fn remove_video(&mut self, id: &VideoId) -> bool {
        let before = self.videos.len();
        self.videos.retain(|v| &v.id != id);
        self.videos.len() != before
    }

    pub fn video_mut(&mut self, id: &VideoId) -> Option<&mut VideoEntryDraft> {
        self.videos.iter_mut().find(|v| &v.id == id)
    }

    /// Attaches a file reference to the given video. Returns the new
    /// attachment id, or `None` if the video is not part of the draft.
    pub fn add_attachment(
        &mut self,
        ids: &mut IdGenerator,
        video: &VideoId,
        name: impl Into<String>,
        url: impl Into<String>,
        mime_type: impl Into<String>,
    ) -> Option<AttachmentId> {
        let entry = self.video_mut(video)?;
        let id = ids.attachment_id();
        entry.attachments.push(Attachment {
            id: id.clone(),
            name: name.into(),
            url: url.into(),
            mime_type: mime_type.into(),
        });
        Some(id)
    }

    pub fn remove_attachment(&mut self, video: &VideoId, attachment: &AttachmentId) -> bool {
        let Some(entry) = self.video_mut(video) else {
            return false;
        };
        let before = entry.attachments.len();
        entry.attachments.retain(|a| &a.id != attachment);
        entry.attachments.len() != before
    }

    fn from_stage(stage: &VideoStage) -> Self {
        Self {
            title: stage.title.clone(),
            description: stage.description.clone(),
            duration_label: stage.duration_label.clone(),
            videos: stage
                .videos
                .iter()
                .map(|v| VideoEntryDraft {
                    id: v.id.clone(),
                    title: v.title.clone(),
                    source_url: v.source_url.clone(),
                    attachments: v.attachments.clone(),
                })
                .collect(),
        }
    }

    fn into_stage(self, id: StageId, existing: Option<&VideoStage>) -> VideoStage {
        let title = or_fallback(
            self.title,
            existing.map_or(DEFAULT_VIDEO_STAGE_TITLE, |s| s.title.as_str()),
        );
        let description = or_fallback(
            self.description,
            existing.map_or(DEFAULT_VIDEO_STAGE_DESCRIPTION, |s| {
                s.description.as_str()
            }),
        );
        let duration_label = or_fallback(
            self.duration_label,
            existing.map_or(DEFAULT_DURATION_LABEL, |s| s.duration_label.as_str()),
        );
        let videos = self
            .videos
            .into_iter()
            .filter(|v| !v.title.trim().is_empty())
            .map(|v| VideoEntry {
                id: v.id,
                title: v.title.trim().to_owned(),
                source_url: v
                    .source_url
                    .map(|u| u.trim().to_owned())
                    .filter(|u| !u.is_empty()),
                attachments: v.attachments,
            })
            .collect();

        VideoStage {
            id,
            title,
            description,
            duration_label,
            videos,
        }
    }
}

//
// ─── TEST DRAFT ────────────────────────────────────────────────────────────────
//

/// A question under construction.
///
/// Options and the correct index are private so the draft can never hold
/// fewer than two options or point past the end of the list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionDraft {
    pub id: QuestionId,
    pub text: String,
    pub explanation: Option<String>,
    options: Vec<String>,
    correct_option_index: usize,
}

impl QuestionDraft {
    pub fn blank(ids: &mut IdGenerator) -> Self {
        Self {
            id: ids.question_id(),
            text: String::new(),
            explanation: None,
            options: vec![String::new(); NEW_QUESTION_OPTIONS],
            correct_option_index: 0,
        }
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn correct_option_index(&self) -> usize {
        self.correct_option_index
    }

    pub fn add_option(&mut self, text: impl Into<String>) -> usize {
        self.options.push(text.into());
        self.options.len() - 1
    }

    /// Removes an option. Refused when only two remain or the index is out
    /// of range. Removing the correct option moves the mark to the first one.
    pub fn remove_option(&mut self, index: usize) -> bool {
        if self.options.len() <= MIN_OPTIONS || index >= self.options.len() {
            return false;
        }
        self.options.remove(index);
        if index == self.correct_option_index {
            self.correct_option_index = 0;
        } else if index < self.correct_option_index {
            self.correct_option_index -= 1;
        }
        true
    }

    pub fn set_option_text(&mut self, index: usize, text: impl Into<String>) -> bool {
        match self.options.get_mut(index) {
            Some(slot) => {
                *slot = text.into();
                true
            }
            None => false,
        }
    }

    pub fn set_correct_option(&mut self, index: usize) -> bool {
        if index >= self.options.len() {
            return false;
        }
        self.correct_option_index = index;
        true
    }

    fn from_question(question: &Question) -> Self {
        Self {
            id: question.id.clone(),
            text: question.text.clone(),
            explanation: question.explanation.clone(),
            options: question.options.clone(),
            correct_option_index: question.correct_option_index,
        }
    }

    fn into_question(self) -> Result<Question, StageValidationError> {
        let explanation = self
            .explanation
            .map(|e| e.trim().to_owned())
            .filter(|e| !e.is_empty());
        Question::new(
            self.id,
            self.text.trim(),
            self.options,
            self.correct_option_index,
            explanation,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TestStageDraft {
    pub title: String,
    pub questions: Vec<QuestionDraft>,
}

impl TestStageDraft {
    /// A blank draft with one empty three-option question.
    pub fn blank(ids: &mut IdGenerator) -> Self {
        let mut draft = Self::default();
        draft.add_question(ids);
        draft
    }

    pub fn add_question(&mut self, ids: &mut IdGenerator) -> QuestionId {
        let question = QuestionDraft::blank(ids);
        let id = question.id.clone();
        self.questions.push(question);
        id
    }

    pub fn remove_question(&mut self, id: &QuestionId) -> bool {
        let before = self.questions.len();
        self.questions.retain(|q| &q.id != id);
        self.questions.len() != before
    }

    pub fn question_mut(&mut self, id: &QuestionId) -> Option<&mut QuestionDraft> {
        self.questions.iter_mut().find(|q| &q.id == id)
    }

    fn from_stage(stage: &TestStage) -> Self {
        Self {
            title: stage.title.clone(),
            questions: stage
                .questions
                .iter()
                .map(QuestionDraft::from_question)
                .collect(),
        }
    }

    fn into_stage(
        self,
        id: StageId,
        existing: Option<&TestStage>,
    ) -> Result<TestStage, StageValidationError> {
        let title = or_fallback(
            self.title,
            existing.map_or(DEFAULT_TEST_STAGE_TITLE, |s| s.title.as_str()),
        );
        let questions = self
            .questions
            .into_iter()
            .filter(|q| !q.text.trim().is_empty())
            .map(QuestionDraft::into_question)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(TestStage {
            id,
            title,
            questions,
        })
    }
}

//
// ─── STAGE DRAFT ───────────────────────────────────────────────────────────────
//

/// Uncommitted content for a new or edited stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageDraft {
    Video(VideoStageDraft),
    Test(TestStageDraft),
}

impl StageDraft {
    pub fn blank(kind: StageKind, ids: &mut IdGenerator) -> Self {
        match kind {
            StageKind::Video => StageDraft::Video(VideoStageDraft::blank(ids)),
            StageKind::Test => StageDraft::Test(TestStageDraft::blank(ids)),
        }
    }

    #[must_use]
    pub fn from_stage(stage: &Stage) -> Self {
        match stage {
            Stage::Video(v) => StageDraft::Video(VideoStageDraft::from_stage(v)),
            Stage::Test(t) => StageDraft::Test(TestStageDraft::from_stage(t)),
        }
    }

    #[must_use]
    pub fn kind(&self) -> StageKind {
        match self {
            StageDraft::Video(_) => StageKind::Video,
            StageDraft::Test(_) => StageKind::Test,
        }
    }

    pub fn as_video_mut(&mut self) -> Option<&mut VideoStageDraft> {
        match self {
            StageDraft::Video(v) => Some(v),
            StageDraft::Test(_) => None,
        }
    }

    pub fn as_test_mut(&mut self) -> Option<&mut TestStageDraft> {
        match self {
            StageDraft::Test(t) => Some(t),
            StageDraft::Video(_) => None,
        }
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        match self {
            StageDraft::Video(v) => v.title = title.into(),
            StageDraft::Test(t) => t.title = title.into(),
        }
    }

    /// Turns the draft into a stage with the given id.
    ///
    /// Blank fields fall back to `existing` when editing, otherwise to the
    /// defaults. Untitled videos and questions without text are dropped.
    ///
    /// # Errors
    ///
    /// Returns `StageValidationError` if a kept question breaks its option
    /// invariants.
    pub fn validate(
        self,
        id: StageId,
        existing: Option<&Stage>,
    ) -> Result<Stage, StageValidationError> {
        match self {
            StageDraft::Video(draft) => {
                let existing = existing.and_then(Stage::as_video);
                Ok(Stage::Video(draft.into_stage(id, existing)))
            }
            StageDraft::Test(draft) => {
                let existing = existing.and_then(Stage::as_test);
                Ok(Stage::Test(draft.into_stage(id, existing)?))
            }
        }
    }
}

fn or_fallback(value: String, fallback: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        fallback.to_owned()
    } else {
        trimmed.to_owned()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
