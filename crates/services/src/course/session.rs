use std::fmt;

use course_core::model::{
    AnswerMap, AttachmentId, ExportDocument, IdGenerator, Question, QuestionId, Snapshot, Stage,
    StageDraft, StageId, StageKind, TestStage, VideoId, import_document, seed_course,
};
use course_core::{AnswerFeedback, Clock, PositionTracker, QuizSession, score, stage_result};
use storage::{BlobRef, BlobStore, CourseRepository, Storage, StorageError};

use super::backup::BackupManager;
use super::editor::{DraftMode, StageEditor};
use super::progress::CourseProgress;
use super::stage_store::{StageSource, StageStore};
use crate::error::{CourseSessionError, EditorError};

/// Injected collaborators of a session.
#[derive(Debug, Clone, Default)]
pub struct CourseSessionConfig {
    pub clock: Clock,
    pub ids: IdGenerator,
}

impl CourseSessionConfig {
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_ids(mut self, ids: IdGenerator) -> Self {
        self.ids = ids;
        self
    }
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// One open course: its stages, the learner's position and answers, the
/// backup slot and the authoring draft.
///
/// Operations run one at a time through `&mut self`. Live records are written
/// through after every change on a best-effort basis; a failed write is logged
/// and the in-memory state stays authoritative. Structural edits also refresh
/// the backup slot with the state they replaced, in a separate write.
pub struct CourseSession {
    course_id: String,
    repo: CourseRepository,
    store: StageStore,
    position: PositionTracker,
    quiz: QuizSession,
    backups: BackupManager,
    editor: StageEditor,
}

fn active_test<'a>(store: &'a StageStore, position: &PositionTracker) -> Option<&'a TestStage> {
    store
        .get(position.current_index())
        .and_then(Stage::as_test)
}

fn read_or_default<T: Default>(
    loaded: Result<Option<T>, StorageError>,
    course_id: &str,
    record: &'static str,
) -> T {
    match loaded {
        Ok(value) => value.unwrap_or_default(),
        Err(err) => {
            tracing::warn!(course_id, record, error = %err, "ignoring unreadable record");
            T::default()
        }
    }
}

impl CourseSession {
    /// Loads `course_id` from `storage`; opening never fails.
    ///
    /// Missing or corrupt records fall back to the seed course, which is then
    /// written through. When the store cannot be read at all the seed is used
    /// in memory only, so the stored course survives until the next edit.
    pub async fn open(
        storage: &Storage,
        course_id: impl Into<String>,
        config: CourseSessionConfig,
    ) -> Self {
        let course_id = course_id.into();
        let repo = storage.course(&course_id);
        let (store, source) = StageStore::load(&repo, config.ids).await;

        let (stored_index, answers) = match source {
            StageSource::Persisted => (
                read_or_default(repo.load_position().await, &course_id, "position"),
                read_or_default(repo.load_answers().await, &course_id, "answers"),
            ),
            StageSource::Seeded | StageSource::Unreachable => (0, AnswerMap::new()),
        };
        let position = PositionTracker::at(stored_index, store.len());
        let mut quiz = QuizSession::with_answers(answers);
        quiz.retain_known(store.stages());

        let session = Self {
            backups: BackupManager::new(repo.clone(), config.clock),
            course_id,
            repo,
            store,
            position,
            quiz,
            editor: StageEditor::new(),
        };
        if source == StageSource::Seeded {
            session.persist_live().await;
        }
        tracing::info!(
            course_id = %session.course_id,
            stages = session.store.len(),
            current_index = session.position.current_index(),
            ?source,
            "course opened"
        );
        session
    }

    // ─── read side ────────────────────────────────────────────────────────────

    #[must_use]
    pub fn course_id(&self) -> &str {
        &self.course_id
    }

    #[must_use]
    pub fn stages(&self) -> &[Stage] {
        self.store.stages()
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.position.current_index()
    }

    #[must_use]
    pub fn current_stage(&self) -> Option<&Stage> {
        self.store.get(self.position.current_index())
    }

    #[must_use]
    pub fn active_test(&self) -> Option<&TestStage> {
        active_test(&self.store, &self.position)
    }

    #[must_use]
    pub fn quiz(&self) -> &QuizSession {
        &self.quiz
    }

    #[must_use]
    pub fn answers(&self) -> &AnswerMap {
        self.quiz.answers()
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.quiz.current_question(self.active_test())
    }

    #[must_use]
    pub fn feedback(&self) -> Option<AnswerFeedback> {
        self.quiz.feedback(self.active_test())
    }

    #[must_use]
    pub fn progress(&self) -> CourseProgress {
        CourseProgress::new(self.position.current_index(), self.store.len())
    }

    /// Course-wide percentage of correct answers.
    #[must_use]
    pub fn score(&self) -> u32 {
        score(self.store.stages(), self.quiz.answers())
    }

    /// `(correct, total)` for one stage, if it exists.
    #[must_use]
    pub fn stage_result(&self, id: &StageId) -> Option<(usize, usize)> {
        self.store
            .find(id)
            .map(|stage| stage_result(stage, self.quiz.answers()))
    }

    #[must_use]
    pub fn editor(&self) -> &StageEditor {
        &self.editor
    }

    // ─── learner actions ──────────────────────────────────────────────────────

    pub async fn advance(&mut self) -> bool {
        let moved = self.position.advance(self.store.len());
        self.after_navigation(moved).await
    }

    pub async fn retreat(&mut self) -> bool {
        let moved = self.position.retreat();
        self.after_navigation(moved).await
    }

    pub async fn jump_to(&mut self, index: usize) -> bool {
        let moved = self.position.jump_to(index, self.store.len());
        self.after_navigation(moved).await
    }

    pub async fn submit_answer(&mut self, question: &QuestionId, option_index: usize) -> bool {
        let active = active_test(&self.store, &self.position);
        let accepted = self.quiz.submit_answer(active, question, option_index);
        if accepted {
            self.persist_answers().await;
        } else {
            tracing::debug!(course_id = %self.course_id, %question, option_index, "answer ignored");
        }
        accepted
    }

    pub fn reveal(&mut self) -> bool {
        let active = active_test(&self.store, &self.position);
        self.quiz.reveal(active)
    }

    pub fn next_question(&mut self) -> bool {
        let active = active_test(&self.store, &self.position);
        self.quiz.next_question(active)
    }

    pub fn prev_question(&mut self) -> bool {
        let active = active_test(&self.store, &self.position);
        self.quiz.prev_question(active)
    }

    /// Clears the current test stage's answers so it can be taken again.
    pub async fn retake(&mut self) -> bool {
        let active = active_test(&self.store, &self.position);
        let cleared = self.quiz.retake(active);
        if cleared {
            self.persist_answers().await;
        }
        cleared
    }

    async fn after_navigation(&mut self, moved: bool) -> bool {
        if moved {
            self.quiz.reset_cursor();
            tracing::debug!(
                course_id = %self.course_id,
                current_index = self.position.current_index(),
                "moved to stage"
            );
            self.persist_position().await;
        }
        moved
    }

    // ─── structural edits ─────────────────────────────────────────────────────

    /// Appends `stage` under a fresh id.
    pub async fn create_stage(&mut self, stage: Stage) -> StageId {
        let (before, active_before) = self.pre_mutation();
        let id = self.store.create(stage);
        tracing::info!(course_id = %self.course_id, stage_id = %id, "stage created");
        self.settle_mutation(before, active_before).await;
        id
    }

    /// Replaces the content of stage `id`. False for an unknown id or a
    /// different kind of stage.
    pub async fn update_stage(&mut self, id: &StageId, patch: Stage) -> bool {
        let (before, active_before) = self.pre_mutation();
        if !self.store.update(id, patch) {
            tracing::debug!(course_id = %self.course_id, stage_id = %id, "update refused");
            return false;
        }
        self.quiz.retain_known(self.store.stages());
        tracing::info!(course_id = %self.course_id, stage_id = %id, "stage updated");
        self.settle_mutation(before, active_before).await;
        true
    }

    /// Removes stage `id` and its answers. False for an unknown id.
    pub async fn delete_stage(&mut self, id: &StageId) -> bool {
        let (before, active_before) = self.pre_mutation();
        let Some((index, _removed)) = self.store.delete(id) else {
            tracing::debug!(course_id = %self.course_id, stage_id = %id, "delete refused");
            return false;
        };
        self.position.on_delete(index);
        self.quiz.retain_known(self.store.stages());
        tracing::info!(course_id = %self.course_id, stage_id = %id, index, "stage deleted");
        self.settle_mutation(before, active_before).await;
        true
    }

    /// Moves one stage; the learner stays on the stage they were viewing.
    pub async fn reorder_stages(&mut self, from_index: usize, to_index: usize) -> bool {
        let (before, active_before) = self.pre_mutation();
        if !self.store.reorder(from_index, to_index) {
            tracing::debug!(course_id = %self.course_id, from_index, to_index, "reorder refused");
            return false;
        }
        self.position.on_reorder(from_index, to_index);
        tracing::info!(course_id = %self.course_id, from_index, to_index, "stage moved");
        self.settle_mutation(before, active_before).await;
        true
    }

    /// Replaces every stage with the ones in an exported document and returns
    /// how many were imported.
    ///
    /// # Errors
    ///
    /// Returns `CourseSessionError::Document` if the document is unusable;
    /// the live state is untouched in that case.
    pub async fn import_stages(&mut self, raw: &str) -> Result<usize, CourseSessionError> {
        let stages = import_document(raw)?;
        let (before, active_before) = self.pre_mutation();
        self.store.replace_all(stages);
        self.quiz.retain_known(self.store.stages());
        tracing::info!(course_id = %self.course_id, stages = self.store.len(), "stages imported");
        self.settle_mutation(before, active_before).await;
        Ok(self.store.len())
    }

    /// Drops the live records and reinstalls the seed course. The backup slot
    /// is kept, so a reset can be undone with `restore_from_backup`.
    pub async fn reset(&mut self) {
        if let Err(err) = self.repo.clear_live().await {
            tracing::warn!(course_id = %self.course_id, error = %err, "could not clear live records");
        }
        self.store.replace_all(seed_course());
        self.position = PositionTracker::new();
        self.quiz = QuizSession::new();
        self.editor.cancel();
        self.persist_live().await;
        tracing::info!(course_id = %self.course_id, "course reset to seed");
    }

    fn pre_mutation(&self) -> (Snapshot, Option<StageId>) {
        (
            self.capture(),
            self.current_stage().map(|s| s.id().clone()),
        )
    }

    async fn settle_mutation(&mut self, before: Snapshot, active_before: Option<StageId>) {
        self.position.clamp(self.store.len());
        let active_now = self.current_stage().map(|s| s.id().clone());
        if self.position.current_index() != before.current_index || active_now != active_before {
            self.quiz.reset_cursor();
        } else {
            self.quiz.clamp_cursor(active_test(&self.store, &self.position));
        }
        self.persist_live().await;
        if let Err(err) = self.backups.write(&before).await {
            tracing::warn!(course_id = %self.course_id, error = %err, "backup not refreshed");
        }
    }

    // ─── authoring drafts ─────────────────────────────────────────────────────

    /// # Errors
    ///
    /// Returns `EditorError::DraftInProgress` if a draft is open.
    pub fn begin_new_stage(&mut self, kind: StageKind) -> Result<(), EditorError> {
        self.editor.begin_new(kind, self.store.ids_mut())
    }

    /// # Errors
    ///
    /// Returns `EditorError` if a draft is open or `id` is unknown.
    pub fn begin_edit(&mut self, id: &StageId) -> Result<(), EditorError> {
        let target = self.store.find(id);
        self.editor.begin_edit(id, target)
    }

    /// Mutable access to the open draft's free-text fields.
    pub fn draft_mut(&mut self) -> Option<&mut StageDraft> {
        self.editor.draft_mut()
    }

    pub fn cancel_draft(&mut self) -> bool {
        self.editor.cancel()
    }

    /// # Errors
    ///
    /// Returns `EditorError` if no video draft is open.
    pub fn add_draft_video(&mut self) -> Result<VideoId, EditorError> {
        self.editor.add_video(self.store.ids_mut())
    }

    /// # Errors
    ///
    /// Returns `EditorError` if no video draft is open.
    pub fn remove_draft_video(&mut self, video: &VideoId) -> Result<bool, EditorError> {
        self.editor.remove_video(video)
    }

    /// # Errors
    ///
    /// Returns `EditorError` if no video draft is open.
    pub fn attach_to_draft_video(
        &mut self,
        video: &VideoId,
        blob: BlobRef,
    ) -> Result<Option<AttachmentId>, EditorError> {
        self.editor.add_attachment(self.store.ids_mut(), video, blob)
    }

    /// Uploads a file through `blobs` and attaches the returned reference.
    ///
    /// # Errors
    ///
    /// Returns `CourseSessionError::Editor` without uploading when no video
    /// draft is open, or `CourseSessionError::Storage` if the upload fails.
    pub async fn upload_attachment(
        &mut self,
        blobs: &dyn BlobStore,
        video: &VideoId,
        file_name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<Option<AttachmentId>, CourseSessionError> {
        match self.editor.draft() {
            None => return Err(EditorError::NoDraft.into()),
            Some(draft) if draft.kind() != StageKind::Video => {
                return Err(EditorError::WrongDraftKind("video").into());
            }
            Some(_) => {}
        }
        let blob = blobs.put(file_name, mime_type, bytes).await?;
        Ok(self.attach_to_draft_video(video, blob)?)
    }

    /// # Errors
    ///
    /// Returns `EditorError` if no video draft is open.
    pub fn remove_draft_attachment(
        &mut self,
        video: &VideoId,
        attachment: &AttachmentId,
    ) -> Result<bool, EditorError> {
        self.editor.remove_attachment(video, attachment)
    }

    /// # Errors
    ///
    /// Returns `EditorError` if no test draft is open.
    pub fn add_draft_question(&mut self) -> Result<QuestionId, EditorError> {
        self.editor.add_question(self.store.ids_mut())
    }

    /// # Errors
    ///
    /// Returns `EditorError` if no test draft is open.
    pub fn remove_draft_question(&mut self, question: &QuestionId) -> Result<bool, EditorError> {
        self.editor.remove_question(question)
    }

    /// # Errors
    ///
    /// Returns `EditorError` if no test draft is open.
    pub fn add_draft_option(
        &mut self,
        question: &QuestionId,
        text: impl Into<String>,
    ) -> Result<Option<usize>, EditorError> {
        self.editor.add_option(question, text)
    }

    /// # Errors
    ///
    /// Returns `EditorError` if no test draft is open.
    pub fn remove_draft_option(
        &mut self,
        question: &QuestionId,
        index: usize,
    ) -> Result<bool, EditorError> {
        self.editor.remove_option(question, index)
    }

    /// Validates the open draft and applies it: a new draft is created, an
    /// edit draft replaces its stage under the original id. The draft is
    /// closed only on success.
    ///
    /// # Errors
    ///
    /// Returns `EditorError::NoDraft` when idle, `EditorError::Validation`
    /// for an invalid draft, or `EditorError::UnknownStage` if the edited
    /// stage was deleted meanwhile.
    pub async fn commit_draft(&mut self) -> Result<StageId, CourseSessionError> {
        let (mode, draft) = self.editor.pending()?;
        let id = match mode {
            DraftMode::New => {
                // create() replaces the placeholder id.
                let stage = draft
                    .validate(StageId::new(""), None)
                    .map_err(EditorError::from)?;
                self.create_stage(stage).await
            }
            DraftMode::Edit(target) => {
                let existing = self
                    .store
                    .find(&target)
                    .cloned()
                    .ok_or_else(|| EditorError::UnknownStage(target.clone()))?;
                let stage = draft
                    .validate(target.clone(), Some(&existing))
                    .map_err(EditorError::from)?;
                if !self.update_stage(&target, stage).await {
                    return Err(EditorError::UnknownStage(target).into());
                }
                target
            }
        };
        self.editor.finish();
        Ok(id)
    }

    // ─── backups ──────────────────────────────────────────────────────────────

    /// Writes the current state into the backup slot, replacing what was
    /// there.
    ///
    /// # Errors
    ///
    /// Returns `CourseSessionError::Storage` if the write fails.
    pub async fn create_backup(&self) -> Result<Snapshot, CourseSessionError> {
        let snapshot = self.capture();
        self.backups.write(&snapshot).await?;
        tracing::info!(course_id = %self.course_id, "backup created");
        Ok(snapshot)
    }

    /// Replaces stages, position and answers with the backup in one step.
    /// Returns false, changing nothing, when there is no usable backup.
    pub async fn restore_from_backup(&mut self) -> bool {
        let Some(snapshot) = self.backups.latest().await else {
            tracing::info!(course_id = %self.course_id, "no usable backup to restore");
            return false;
        };
        let Snapshot {
            stages,
            current_index,
            answers,
            timestamp,
        } = snapshot;
        let len = stages.len();
        self.store.replace_all(stages);
        self.position = PositionTracker::at(current_index, len);
        self.quiz = QuizSession::with_answers(answers);
        self.quiz.retain_known(self.store.stages());
        self.persist_live().await;
        tracing::info!(course_id = %self.course_id, %timestamp, "restored from backup");
        true
    }

    /// Stages only, ready to be saved as `{course_id}-export.json`.
    #[must_use]
    pub fn export_snapshot(&self) -> ExportDocument {
        self.backups.export(self.store.stages())
    }

    fn capture(&self) -> Snapshot {
        self.backups.capture(
            self.store.stages(),
            self.position.current_index(),
            self.quiz.answers(),
        )
    }

    // ─── persistence ──────────────────────────────────────────────────────────

    async fn persist_live(&self) {
        if let Err(err) = self.store.persist(&self.repo).await {
            tracing::warn!(course_id = %self.course_id, error = %err, "stages not persisted");
        }
        self.persist_position().await;
        self.persist_answers().await;
    }

    async fn persist_position(&self) {
        if let Err(err) = self.repo.save_position(self.position.current_index()).await {
            tracing::warn!(course_id = %self.course_id, error = %err, "position not persisted");
        }
    }

    async fn persist_answers(&self) {
        if let Err(err) = self.repo.save_answers(self.quiz.answers()).await {
            tracing::warn!(course_id = %self.course_id, error = %err, "answers not persisted");
        }
    }
}

impl fmt::Debug for CourseSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CourseSession")
            .field("course_id", &self.course_id)
            .field("stages_len", &self.store.len())
            .field("current_index", &self.position.current_index())
            .field("answers_len", &self.quiz.answers().len())
            .field("editor_idle", &self.editor.is_idle())
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
