use std::collections::HashSet;

use course_core::model::{IdGenerator, QuestionId, Stage, StageId, seed_course, validate_stages};
use storage::{CourseRepository, StorageError};

/// Ordered stage list of one course.
///
/// Pure in-memory mutation; `persist`/`load` move the list through a
/// `CourseRepository`. Position bookkeeping is the caller's job, driven by the
/// indices each mutation reports.
#[derive(Debug, Clone)]
pub struct StageStore {
    stages: Vec<Stage>,
    ids: IdGenerator,
}

impl StageStore {
    #[must_use]
    pub fn new(stages: Vec<Stage>, ids: IdGenerator) -> Self {
        Self { stages, ids }
    }

    /// Store holding the two-stage seed course.
    #[must_use]
    pub fn seeded(ids: IdGenerator) -> Self {
        Self::new(seed_course(), ids)
    }

    #[must_use]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Stage> {
        self.stages.get(index)
    }

    #[must_use]
    pub fn find(&self, id: &StageId) -> Option<&Stage> {
        self.stages.iter().find(|s| s.id() == id)
    }

    #[must_use]
    pub fn index_of(&self, id: &StageId) -> Option<usize> {
        self.stages.iter().position(|s| s.id() == id)
    }

    pub(crate) fn ids_mut(&mut self) -> &mut IdGenerator {
        &mut self.ids
    }

    /// Appends `stage` under a freshly minted id, which is returned. Any id
    /// the stage carried is discarded, and question ids already used
    /// elsewhere in the course are replaced.
    pub fn create(&mut self, stage: Stage) -> StageId {
        let id = loop {
            let candidate = self.ids.stage_id();
            if self.find(&candidate).is_none() {
                break candidate;
            }
        };
        let mut stage = stage.with_id(id.clone());
        self.claim_question_ids(&mut stage, None);
        self.stages.push(stage);
        id
    }

    /// Replaces the stage `id` with `patch`, keeping its id. Refused when the
    /// id is unknown or `patch` is a different kind of stage.
    pub fn update(&mut self, id: &StageId, patch: Stage) -> bool {
        let Some(index) = self.index_of(id) else {
            return false;
        };
        if self.stages[index].kind() != patch.kind() {
            return false;
        }
        let mut patch = patch.with_id(id.clone());
        self.claim_question_ids(&mut patch, Some(id));
        self.stages[index] = patch;
        true
    }

    /// Re-keys questions of `stage` whose id is taken by another stage, or
    /// repeated within `stage`. `replacing` names the stage being overwritten.
    fn claim_question_ids(&mut self, stage: &mut Stage, replacing: Option<&StageId>) {
        let Stage::Test(test) = stage else {
            return;
        };
        let mut taken: HashSet<QuestionId> = self
            .stages
            .iter()
            .filter(|s| Some(s.id()) != replacing)
            .flat_map(Stage::questions)
            .map(|q| q.id.clone())
            .collect();
        for question in &mut test.questions {
            while !taken.insert(question.id.clone()) {
                question.id = self.ids.question_id();
            }
        }
    }

    /// Removes the stage `id`, returning the index it occupied and the stage.
    pub fn delete(&mut self, id: &StageId) -> Option<(usize, Stage)> {
        let index = self.index_of(id)?;
        Some((index, self.stages.remove(index)))
    }

    /// Moves the stage at `from_index` so it ends up at `to_index`.
    pub fn reorder(&mut self, from_index: usize, to_index: usize) -> bool {
        let len = self.stages.len();
        if from_index >= len || to_index >= len {
            return false;
        }
        if from_index != to_index {
            let stage = self.stages.remove(from_index);
            self.stages.insert(to_index, stage);
        }
        true
    }

    pub fn replace_all(&mut self, stages: Vec<Stage>) {
        self.stages = stages;
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the write fails.
    pub async fn persist(&self, repo: &CourseRepository) -> Result<(), StorageError> {
        repo.save_stages(&self.stages).await
    }

    /// Reads the persisted list, falling back to the seed course when it is
    /// missing, unreadable or inconsistent. The returned source tells the
    /// caller whether the seed should be written back.
    pub async fn load(repo: &CourseRepository, ids: IdGenerator) -> (Self, StageSource) {
        let course_id = repo.keys().course_id();
        match repo.load_stages().await {
            Ok(Some(stages)) => match validate_stages(&stages) {
                Ok(()) => (Self::new(stages, ids), StageSource::Persisted),
                Err(err) => {
                    tracing::warn!(course_id, error = %err, "persisted stages invalid, using seed course");
                    (Self::seeded(ids), StageSource::Seeded)
                }
            },
            Ok(None) => {
                tracing::info!(course_id, "no persisted stages, using seed course");
                (Self::seeded(ids), StageSource::Seeded)
            }
            Err(StorageError::Serialization(err)) => {
                tracing::warn!(course_id, error = %err, "persisted stages unparsable, using seed course");
                (Self::seeded(ids), StageSource::Seeded)
            }
            Err(err) => {
                tracing::warn!(course_id, error = %err, "store unreachable, using seed course without saving it");
                (Self::seeded(ids), StageSource::Unreachable)
            }
        }
    }
}

/// Where the stages of a freshly loaded store came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageSource {
    /// The persisted list was valid.
    Persisted,
    /// Nothing usable was stored; the seed replaces it.
    Seeded,
    /// The store could not be read. The seed is held in memory only, so a
    /// record that may still be valid is not overwritten.
    Unreachable,
}

#[cfg(test)]
mod tests {
    use super::*;
    use course_core::model::{Question, StageKind, TestStage, VideoStage};
    use std::sync::Arc;
    use storage::{InMemoryStore, KeyValueStore};

    fn test_stage(title: &str) -> Stage {
        Stage::Test(TestStage {
            id: StageId::new(""),
            title: title.into(),
            questions: Vec::new(),
        })
    }

    fn video_stage(title: &str) -> Stage {
        Stage::Video(VideoStage {
            id: StageId::new(""),
            title: title.into(),
            description: String::new(),
            duration_label: String::new(),
            videos: Vec::new(),
        })
    }

    fn titles(store: &StageStore) -> Vec<&str> {
        store.stages().iter().map(Stage::title).collect()
    }

    #[test]
    fn create_assigns_fresh_unique_ids() {
        let mut store = StageStore::new(Vec::new(), IdGenerator::sequential());
        let a = store.create(test_stage("A"));
        let b = store.create(test_stage("B"));
        assert_ne!(a, b);
        assert_eq!(store.index_of(&b), Some(1));
    }

    #[test]
    fn create_skips_ids_already_in_use() {
        let existing = test_stage("old").with_id(StageId::new("stage-1"));
        let mut store = StageStore::new(vec![existing], IdGenerator::sequential());
        let id = store.create(test_stage("new"));
        assert_eq!(id, StageId::new("stage-2"));
    }

    #[test]
    fn update_keeps_id_and_refuses_kind_change() {
        let mut store = StageStore::new(Vec::new(), IdGenerator::sequential());
        let id = store.create(test_stage("A"));
        assert!(store.update(&id, test_stage("A2").with_id(StageId::new("other"))));
        assert_eq!(store.find(&id).map(Stage::title), Some("A2"));
        assert!(!store.update(&id, video_stage("V")));
        assert_eq!(store.find(&id).map(Stage::kind), Some(StageKind::Test));
        assert!(!store.update(&StageId::new("missing"), test_stage("X")));
    }

    fn quiz(title: &str, question_id: &str) -> Stage {
        Stage::Test(TestStage {
            id: StageId::new(""),
            title: title.into(),
            questions: vec![Question {
                id: QuestionId::new(question_id),
                text: "?".into(),
                options: vec!["a".into(), "b".into()],
                correct_option_index: 0,
                explanation: None,
            }],
        })
    }

    #[test]
    fn question_ids_stay_unique_across_stages() {
        let mut store = StageStore::new(Vec::new(), IdGenerator::sequential());
        let first = store.create(quiz("A", "q"));
        let second = store.create(quiz("B", "q"));
        assert_ne!(
            store.find(&first).unwrap().questions()[0].id,
            store.find(&second).unwrap().questions()[0].id
        );

        // Re-saving a stage keeps its own ids.
        assert!(store.update(&first, quiz("A2", "q")));
        assert_eq!(store.find(&first).unwrap().questions()[0].id, QuestionId::new("q"));
        assert!(validate_stages(store.stages()).is_ok());
    }

    #[test]
    fn delete_reports_removed_index() {
        let mut store = StageStore::new(Vec::new(), IdGenerator::sequential());
        store.create(test_stage("A"));
        let b = store.create(test_stage("B"));
        let (index, removed) = store.delete(&b).unwrap();
        assert_eq!(index, 1);
        assert_eq!(removed.title(), "B");
        assert!(store.delete(&b).is_none());
    }

    #[test]
    fn reorder_moves_and_rejects_out_of_range() {
        let mut store = StageStore::new(Vec::new(), IdGenerator::sequential());
        for title in ["A", "B", "C"] {
            store.create(test_stage(title));
        }
        assert!(store.reorder(0, 2));
        assert_eq!(titles(&store), vec!["B", "C", "A"]);
        assert!(store.reorder(2, 0));
        assert_eq!(titles(&store), vec!["A", "B", "C"]);
        assert!(!store.reorder(0, 3));
        assert!(!store.reorder(5, 0));
    }

    #[tokio::test]
    async fn load_falls_back_to_seed_on_corrupt_data() {
        let kv = InMemoryStore::new();
        kv.set("minicourse-c-data", "not json").await.unwrap();
        let repo = CourseRepository::new(Arc::new(kv), "c");
        let (store, source) = StageStore::load(&repo, IdGenerator::sequential()).await;
        assert_eq!(source, StageSource::Seeded);
        assert_eq!(store.stages(), seed_course().as_slice());
    }

    #[tokio::test]
    async fn persist_then_load_round_trips() {
        let repo = CourseRepository::new(Arc::new(InMemoryStore::new()), "c");
        let mut store = StageStore::new(Vec::new(), IdGenerator::sequential());
        store.create(video_stage("Intro"));
        store.persist(&repo).await.unwrap();

        let (loaded, source) = StageStore::load(&repo, IdGenerator::sequential()).await;
        assert_eq!(source, StageSource::Persisted);
        assert_eq!(loaded.stages(), store.stages());
    }
}
