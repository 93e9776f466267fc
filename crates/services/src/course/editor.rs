use course_core::model::{
    AttachmentId, IdGenerator, QuestionId, Stage, StageDraft, StageId, StageKind,
    TestStageDraft, VideoId, VideoStageDraft,
};
use storage::BlobRef;

use crate::error::EditorError;

/// Whether the open draft becomes a new stage or replaces an existing one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftMode {
    New,
    Edit(StageId),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
enum EditorState {
    #[default]
    Idle,
    Drafting { mode: DraftMode, draft: StageDraft },
}

/// Authoring state machine: `Idle -> Drafting -> Idle`.
///
/// At most one draft is open. Committing is done by the owning session, which
/// calls `finish` once the stage store accepted the result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageEditor {
    state: EditorState,
}

impl StageEditor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        matches!(self.state, EditorState::Idle)
    }

    #[must_use]
    pub fn mode(&self) -> Option<&DraftMode> {
        match &self.state {
            EditorState::Idle => None,
            EditorState::Drafting { mode, .. } => Some(mode),
        }
    }

    #[must_use]
    pub fn draft(&self) -> Option<&StageDraft> {
        match &self.state {
            EditorState::Idle => None,
            EditorState::Drafting { draft, .. } => Some(draft),
        }
    }

    pub fn draft_mut(&mut self) -> Option<&mut StageDraft> {
        match &mut self.state {
            EditorState::Idle => None,
            EditorState::Drafting { draft, .. } => Some(draft),
        }
    }

    /// Opens a blank draft for a new stage.
    ///
    /// # Errors
    ///
    /// Returns `EditorError::DraftInProgress` if a draft is already open.
    pub fn begin_new(&mut self, kind: StageKind, ids: &mut IdGenerator) -> Result<(), EditorError> {
        self.ensure_idle()?;
        self.state = EditorState::Drafting {
            mode: DraftMode::New,
            draft: StageDraft::blank(kind, ids),
        };
        Ok(())
    }

    /// Opens a draft prefilled from `target`. `None` means the stage the
    /// caller looked up does not exist.
    ///
    /// # Errors
    ///
    /// Returns `EditorError::DraftInProgress` if a draft is already open, or
    /// `EditorError::UnknownStage` when there is no target.
    pub fn begin_edit(&mut self, id: &StageId, target: Option<&Stage>) -> Result<(), EditorError> {
        self.ensure_idle()?;
        let stage = target.ok_or_else(|| EditorError::UnknownStage(id.clone()))?;
        self.state = EditorState::Drafting {
            mode: DraftMode::Edit(stage.id().clone()),
            draft: StageDraft::from_stage(stage),
        };
        Ok(())
    }

    /// Drops the open draft. Returns false when nothing was open.
    pub fn cancel(&mut self) -> bool {
        let was_drafting = !self.is_idle();
        self.state = EditorState::Idle;
        was_drafting
    }

    /// Copy of the open draft for committing.
    ///
    /// # Errors
    ///
    /// Returns `EditorError::NoDraft` when idle.
    pub fn pending(&self) -> Result<(DraftMode, StageDraft), EditorError> {
        match &self.state {
            EditorState::Idle => Err(EditorError::NoDraft),
            EditorState::Drafting { mode, draft } => Ok((mode.clone(), draft.clone())),
        }
    }

    pub(crate) fn finish(&mut self) {
        self.state = EditorState::Idle;
    }

    fn ensure_idle(&self) -> Result<(), EditorError> {
        if self.is_idle() {
            Ok(())
        } else {
            Err(EditorError::DraftInProgress)
        }
    }

    fn video_draft(&mut self) -> Result<&mut VideoStageDraft, EditorError> {
        self.draft_mut()
            .ok_or(EditorError::NoDraft)?
            .as_video_mut()
            .ok_or(EditorError::WrongDraftKind("video"))
    }

    fn test_draft(&mut self) -> Result<&mut TestStageDraft, EditorError> {
        self.draft_mut()
            .ok_or(EditorError::NoDraft)?
            .as_test_mut()
            .ok_or(EditorError::WrongDraftKind("test"))
    }

    // ─── video drafts ─────────────────────────────────────────────────────────

    /// # Errors
    ///
    /// Returns `EditorError` if no video draft is open.
    pub fn add_video(&mut self, ids: &mut IdGenerator) -> Result<VideoId, EditorError> {
        Ok(self.video_draft()?.add_video(ids))
    }

    /// # Errors
    ///
    /// Returns `EditorError` if no video draft is open.
    pub fn remove_video(&mut self, video: &VideoId) -> Result<bool, EditorError> {
        Ok(self.video_draft()?.remove_video(video))
    }

    /// Attaches an uploaded file to `video`; `None` if the video is unknown.
    ///
    /// # Errors
    ///
    /// Returns `EditorError` if no video draft is open.
    pub fn add_attachment(
        &mut self,
        ids: &mut IdGenerator,
        video: &VideoId,
        blob: BlobRef,
    ) -> Result<Option<AttachmentId>, EditorError> {
        Ok(self
            .video_draft()?
            .add_attachment(ids, video, blob.name, blob.url, blob.mime_type))
    }

    /// # Errors
    ///
    /// Returns `EditorError` if no video draft is open.
    pub fn remove_attachment(
        &mut self,
        video: &VideoId,
        attachment: &AttachmentId,
    ) -> Result<bool, EditorError> {
        Ok(self.video_draft()?.remove_attachment(video, attachment))
    }

    // ─── test drafts ──────────────────────────────────────────────────────────

    /// # Errors
    ///
    /// Returns `EditorError` if no test draft is open.
    pub fn add_question(&mut self, ids: &mut IdGenerator) -> Result<QuestionId, EditorError> {
        Ok(self.test_draft()?.add_question(ids))
    }

    /// # Errors
    ///
    /// Returns `EditorError` if no test draft is open.
    pub fn remove_question(&mut self, question: &QuestionId) -> Result<bool, EditorError> {
        Ok(self.test_draft()?.remove_question(question))
    }

    /// Appends an option and returns its index; `None` if the question is
    /// not in the draft.
    ///
    /// # Errors
    ///
    /// Returns `EditorError` if no test draft is open.
    pub fn add_option(
        &mut self,
        question: &QuestionId,
        text: impl Into<String>,
    ) -> Result<Option<usize>, EditorError> {
        Ok(self
            .test_draft()?
            .question_mut(question)
            .map(|q| q.add_option(text)))
    }

    /// Removing below two options, or an unknown question or index, is a
    /// no-op reported as `false`.
    ///
    /// # Errors
    ///
    /// Returns `EditorError` if no test draft is open.
    pub fn remove_option(&mut self, question: &QuestionId, index: usize) -> Result<bool, EditorError> {
        Ok(self
            .test_draft()?
            .question_mut(question)
            .is_some_and(|q| q.remove_option(index)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_draft_is_rejected_until_cancel() {
        let mut ids = IdGenerator::sequential();
        let mut editor = StageEditor::new();
        editor.begin_new(StageKind::Video, &mut ids).unwrap();
        assert_eq!(
            editor.begin_new(StageKind::Test, &mut ids),
            Err(EditorError::DraftInProgress)
        );
        assert!(editor.cancel());
        assert!(editor.is_idle());
        assert!(!editor.cancel());
        editor.begin_new(StageKind::Test, &mut ids).unwrap();
        assert_eq!(editor.mode(), Some(&DraftMode::New));
    }

    #[test]
    fn edit_without_target_is_rejected() {
        let mut editor = StageEditor::new();
        let id = StageId::new("ghost");
        assert_eq!(
            editor.begin_edit(&id, None),
            Err(EditorError::UnknownStage(id))
        );
        assert!(editor.is_idle());
    }

    #[test]
    fn draft_ops_require_matching_kind() {
        let mut ids = IdGenerator::sequential();
        let mut editor = StageEditor::new();
        assert_eq!(editor.add_question(&mut ids), Err(EditorError::NoDraft));

        editor.begin_new(StageKind::Video, &mut ids).unwrap();
        assert_eq!(
            editor.add_question(&mut ids),
            Err(EditorError::WrongDraftKind("test"))
        );
        let video = editor.add_video(&mut ids).unwrap();
        let blob = BlobRef {
            url: "memory://uploads/1-a.pdf".into(),
            name: "a.pdf".into(),
            mime_type: "application/pdf".into(),
        };
        let file = editor.add_attachment(&mut ids, &video, blob).unwrap().unwrap();
        assert!(editor.remove_attachment(&video, &file).unwrap());
        assert!(editor.remove_video(&video).unwrap());
    }

    #[test]
    fn option_removal_stops_at_two() {
        let mut ids = IdGenerator::sequential();
        let mut editor = StageEditor::new();
        editor.begin_new(StageKind::Test, &mut ids).unwrap();
        let question = editor.add_question(&mut ids).unwrap();
        assert!(editor.remove_option(&question, 0).unwrap());
        assert!(!editor.remove_option(&question, 0).unwrap());
        assert_eq!(editor.add_option(&question, "extra").unwrap(), Some(2));
        assert_eq!(
            editor.add_option(&QuestionId::new("nope"), "x").unwrap(),
            None
        );
    }
}
