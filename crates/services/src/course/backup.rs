use course_core::Clock;
use course_core::model::{AnswerMap, ExportDocument, Snapshot, Stage};
use storage::{CourseRepository, StorageError};

/// Owns the single backup slot of a course. Every write replaces the previous
/// snapshot; there is no history.
#[derive(Clone)]
pub struct BackupManager {
    repo: CourseRepository,
    clock: Clock,
}

impl BackupManager {
    #[must_use]
    pub fn new(repo: CourseRepository, clock: Clock) -> Self {
        Self { repo, clock }
    }

    /// Copies the given state into a snapshot stamped with the clock's now.
    #[must_use]
    pub fn capture(&self, stages: &[Stage], current_index: usize, answers: &AnswerMap) -> Snapshot {
        Snapshot {
            stages: stages.to_vec(),
            current_index,
            answers: answers.clone(),
            timestamp: self.clock.now(),
        }
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the backup slot cannot be written.
    pub async fn write(&self, snapshot: &Snapshot) -> Result<(), StorageError> {
        self.repo.save_backup(snapshot).await?;
        tracing::debug!(
            course_id = self.repo.keys().course_id(),
            stages = snapshot.stages.len(),
            "backup written"
        );
        Ok(())
    }

    /// The stored snapshot, if there is a readable and consistent one.
    pub async fn latest(&self) -> Option<Snapshot> {
        let course_id = self.repo.keys().course_id();
        match self.repo.load_backup().await {
            Ok(Some(snapshot)) => match snapshot.validate() {
                Ok(()) => Some(snapshot),
                Err(err) => {
                    tracing::warn!(course_id, error = %err, "backup holds invalid stages");
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                tracing::warn!(course_id, error = %err, "backup unreadable");
                None
            }
        }
    }

    /// Read-only export of `stages`; position and answers are left out.
    #[must_use]
    pub fn export(&self, stages: &[Stage]) -> ExportDocument {
        ExportDocument {
            course_id: self.repo.keys().course_id().to_owned(),
            stages: stages.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use course_core::model::seed_course;
    use course_core::time::{fixed_clock, fixed_now};
    use std::sync::Arc;
    use storage::{InMemoryStore, KeyValueStore};

    fn manager() -> (InMemoryStore, BackupManager) {
        let kv = InMemoryStore::new();
        let repo = CourseRepository::new(Arc::new(kv.clone()), "c");
        (kv, BackupManager::new(repo, fixed_clock()))
    }

    #[tokio::test]
    async fn write_overwrites_the_single_slot() {
        let (_, backups) = manager();
        let first = backups.capture(&seed_course(), 1, &AnswerMap::new());
        backups.write(&first).await.unwrap();
        let second = backups.capture(&[], 0, &AnswerMap::new());
        backups.write(&second).await.unwrap();

        let latest = backups.latest().await.unwrap();
        assert!(latest.stages.is_empty());
        assert_eq!(latest.timestamp, fixed_now());
    }

    #[tokio::test]
    async fn unparsable_backup_reads_as_absent() {
        let (kv, backups) = manager();
        kv.set("minicourse-c-backup", "{\"stages\": 7}").await.unwrap();
        assert!(backups.latest().await.is_none());
    }

    #[test]
    fn export_carries_only_stages() {
        let (_, backups) = manager();
        let doc = backups.export(&seed_course());
        assert_eq!(doc.course_id, "c");
        assert_eq!(doc.file_name(), "c-export.json");
        assert_eq!(doc.stages, seed_course());
    }
}
