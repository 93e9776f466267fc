use std::sync::Arc;

use course_core::model::{AnswerMap, Snapshot, Stage};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::repository::{KeyValueStore, StorageError};

/// Key names of the four records persisted per course.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseKeys {
    course_id: String,
}

impl CourseKeys {
    #[must_use]
    pub fn new(course_id: impl Into<String>) -> Self {
        Self {
            course_id: course_id.into(),
        }
    }

    #[must_use]
    pub fn course_id(&self) -> &str {
        &self.course_id
    }

    #[must_use]
    pub fn stages(&self) -> String {
        format!("minicourse-{}-data", self.course_id)
    }

    #[must_use]
    pub fn position(&self) -> String {
        format!("minicourse-{}-stage", self.course_id)
    }

    #[must_use]
    pub fn answers(&self) -> String {
        format!("minicourse-{}-answers", self.course_id)
    }

    #[must_use]
    pub fn backup(&self) -> String {
        format!("minicourse-{}-backup", self.course_id)
    }
}

/// Typed access to one course's live records and its backup slot.
///
/// Each method is a single independent write or read; nothing here spans
/// records transactionally.
#[derive(Clone)]
pub struct CourseRepository {
    store: Arc<dyn KeyValueStore>,
    keys: CourseKeys,
}

impl CourseRepository {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, course_id: impl Into<String>) -> Self {
        Self {
            store,
            keys: CourseKeys::new(course_id),
        }
    }

    #[must_use]
    pub fn keys(&self) -> &CourseKeys {
        &self.keys
    }

    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the stored list is malformed.
    pub async fn load_stages(&self) -> Result<Option<Vec<Stage>>, StorageError> {
        self.read_json(&self.keys.stages()).await
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the write fails.
    pub async fn save_stages(&self, stages: &[Stage]) -> Result<(), StorageError> {
        self.write_json(&self.keys.stages(), stages).await
    }

    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the stored value is not an index.
    pub async fn load_position(&self) -> Result<Option<usize>, StorageError> {
        let Some(raw) = self.store.get(&self.keys.position()).await? else {
            return Ok(None);
        };
        raw.trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|e| StorageError::Serialization(format!("position: {e}")))
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the write fails.
    pub async fn save_position(&self, index: usize) -> Result<(), StorageError> {
        self.store
            .set(&self.keys.position(), &index.to_string())
            .await
    }

    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the stored map is malformed.
    pub async fn load_answers(&self) -> Result<Option<AnswerMap>, StorageError> {
        self.read_json(&self.keys.answers()).await
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the write fails.
    pub async fn save_answers(&self, answers: &AnswerMap) -> Result<(), StorageError> {
        self.write_json(&self.keys.answers(), answers).await
    }

    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the backup is unparsable.
    pub async fn load_backup(&self) -> Result<Option<Snapshot>, StorageError> {
        self.read_json(&self.keys.backup()).await
    }

    /// Overwrites the single backup slot.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write fails.
    pub async fn save_backup(&self, snapshot: &Snapshot) -> Result<(), StorageError> {
        self.write_json(&self.keys.backup(), snapshot).await
    }

    /// Removes the live records. The backup slot is kept.
    ///
    /// # Errors
    ///
    /// Returns the first `StorageError` hit.
    pub async fn clear_live(&self) -> Result<(), StorageError> {
        self.store.remove(&self.keys.stages()).await?;
        self.store.remove(&self.keys.position()).await?;
        self.store.remove(&self.keys.answers()).await
    }

    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        let Some(raw) = self.store.get(key).await? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| StorageError::Serialization(format!("{key}: {e}")))
    }

    async fn write_json<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
    ) -> Result<(), StorageError> {
        let raw = serde_json::to_string(value)
            .map_err(|e| StorageError::Serialization(format!("{key}: {e}")))?;
        self.store.set(key, &raw).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryStore;
    use course_core::model::{QuestionId, seed_course};
    use course_core::time::fixed_now;

    fn repo() -> (InMemoryStore, CourseRepository) {
        let store = InMemoryStore::new();
        let repo = CourseRepository::new(Arc::new(store.clone()), "physics");
        (store, repo)
    }

    #[test]
    fn keys_are_scoped_by_course() {
        let keys = CourseKeys::new("physics");
        assert_eq!(keys.stages(), "minicourse-physics-data");
        assert_eq!(keys.position(), "minicourse-physics-stage");
        assert_eq!(keys.answers(), "minicourse-physics-answers");
        assert_eq!(keys.backup(), "minicourse-physics-backup");
    }

    #[tokio::test]
    async fn live_records_round_trip() {
        let (_, repo) = repo();
        let stages = seed_course();
        let mut answers = AnswerMap::new();
        answers.insert(QuestionId::new("q1"), 1);

        repo.save_stages(&stages).await.unwrap();
        repo.save_position(1).await.unwrap();
        repo.save_answers(&answers).await.unwrap();

        assert_eq!(repo.load_stages().await.unwrap(), Some(stages));
        assert_eq!(repo.load_position().await.unwrap(), Some(1));
        assert_eq!(repo.load_answers().await.unwrap(), Some(answers));
    }

    #[tokio::test]
    async fn malformed_records_surface_serialization_errors() {
        let (store, repo) = repo();
        store.set("minicourse-physics-data", "{oops").await.unwrap();
        store.set("minicourse-physics-stage", "-3").await.unwrap();
        assert!(matches!(
            repo.load_stages().await,
            Err(StorageError::Serialization(_))
        ));
        assert!(matches!(
            repo.load_position().await,
            Err(StorageError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn clear_live_keeps_backup() {
        let (store, repo) = repo();
        repo.save_stages(&seed_course()).await.unwrap();
        repo.save_backup(&Snapshot {
            stages: seed_course(),
            current_index: 0,
            answers: AnswerMap::new(),
            timestamp: fixed_now(),
        })
        .await
        .unwrap();

        repo.clear_live().await.unwrap();
        assert!(store.raw("minicourse-physics-data").is_none());
        assert!(repo.load_backup().await.unwrap().is_some());
    }
}
