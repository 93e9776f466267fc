use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("write rejected for key {0}")]
    WriteRejected(String),
}

/// String key-value persistence seam. Course state is routed through it so
/// tests can swap in an in-memory fake.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove `key`. Missing keys are not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// In-memory store for tests and prototyping.
///
/// Writes to keys registered with `reject_writes_to` fail, which lets tests
/// observe what happens when one of two consecutive writes is lost. Reads of
/// keys registered with `reject_reads_of` fail as if the backend were down.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    records: Arc<Mutex<HashMap<String, String>>>,
    rejected: Arc<Mutex<HashSet<String>>>,
    unreadable: Arc<Mutex<HashSet<String>>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later `set`/`remove` on `key` fail.
    pub fn reject_writes_to(&self, key: impl Into<String>) {
        if let Ok(mut guard) = self.rejected.lock() {
            guard.insert(key.into());
        }
    }

    pub fn accept_all_writes(&self) {
        if let Ok(mut guard) = self.rejected.lock() {
            guard.clear();
        }
    }

    /// Make every later `get` of `key` fail with a connection error.
    pub fn reject_reads_of(&self, key: impl Into<String>) {
        if let Ok(mut guard) = self.unreadable.lock() {
            guard.insert(key.into());
        }
    }

    pub fn accept_all_reads(&self) {
        if let Ok(mut guard) = self.unreadable.lock() {
            guard.clear();
        }
    }

    /// Direct read that bypasses the trait, for assertions.
    #[must_use]
    pub fn raw(&self, key: &str) -> Option<String> {
        self.records
            .lock()
            .ok()
            .and_then(|guard| guard.get(key).cloned())
    }

    fn check_writable(&self, key: &str) -> Result<(), StorageError> {
        let guard = self
            .rejected
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        if guard.contains(key) {
            return Err(StorageError::WriteRejected(key.to_owned()));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let unreadable = self
            .unreadable
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?
            .contains(key);
        if unreadable {
            return Err(StorageError::Connection(format!("read refused for key {key}")));
        }
        let guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.check_writable(key)?;
        let mut guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.check_writable(key)?;
        let mut guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.remove(key);
        Ok(())
    }
}

/// Holds the configured backend behind a trait object for easy swapping.
#[derive(Clone)]
pub struct Storage {
    pub records: Arc<dyn KeyValueStore>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let records: Arc<dyn KeyValueStore> = Arc::new(InMemoryStore::new());
        Self { records }
    }

    #[must_use]
    pub fn course(&self, course_id: &str) -> crate::course_repo::CourseRepository {
        crate::course_repo::CourseRepository::new(Arc::clone(&self.records), course_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_get_remove_round_trip() {
        let store = InMemoryStore::new();
        assert_eq!(store.get("k").await.unwrap(), None);
        store.set("k", "v").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
        store.remove("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn rejected_keys_fail_writes_but_keep_old_value() {
        let store = InMemoryStore::new();
        store.set("k", "old").await.unwrap();
        store.reject_writes_to("k");
        let err = store.set("k", "new").await.unwrap_err();
        assert!(matches!(err, StorageError::WriteRejected(_)));
        assert_eq!(store.raw("k").as_deref(), Some("old"));

        store.accept_all_writes();
        store.set("k", "new").await.unwrap();
        assert_eq!(store.raw("k").as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn unreadable_keys_fail_until_reads_are_accepted() {
        let store = InMemoryStore::new();
        store.set("k", "v").await.unwrap();
        store.reject_reads_of("k");
        let err = store.get("k").await.unwrap_err();
        assert!(matches!(err, StorageError::Connection(_)));
        assert_eq!(store.get("other").await.unwrap(), None);

        store.accept_all_reads();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn clones_share_records() {
        let store = InMemoryStore::new();
        let other = store.clone();
        store.set("shared", "1").await.unwrap();
        assert_eq!(other.get("shared").await.unwrap().as_deref(), Some("1"));
    }
}
