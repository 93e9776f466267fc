use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::repository::StorageError;

/// Reference handed back by blob storage. The course only stores and
/// forwards it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobRef {
    pub url: String,
    pub name: String,
    pub mime_type: String,
}

/// Upload target for video files and attachments.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` and return a reference to them.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the upload fails.
    async fn put(
        &self,
        file_name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<BlobRef, StorageError>;
}

/// Keeps uploads in memory and hands out `memory://uploads/{n}-{name}` urls.
#[derive(Clone, Default)]
pub struct InMemoryBlobStore {
    blobs: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl InMemoryBlobStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn bytes(&self, url: &str) -> Option<Vec<u8>> {
        self.blobs.lock().ok()?.get(url).cloned()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put(
        &self,
        file_name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<BlobRef, StorageError> {
        let mut guard = self
            .blobs
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let url = format!("memory://uploads/{}-{file_name}", guard.len() + 1);
        guard.insert(url.clone(), bytes);
        Ok(BlobRef {
            url,
            name: file_name.to_owned(),
            mime_type: mime_type.to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn uploads_get_distinct_urls() {
        let store = InMemoryBlobStore::new();
        let a = store.put("a.mp4", "video/mp4", vec![1]).await.unwrap();
        let b = store.put("a.mp4", "video/mp4", vec![2]).await.unwrap();
        assert_ne!(a.url, b.url);
        assert_eq!(store.bytes(&b.url), Some(vec![2]));
        assert_eq!(a.mime_type, "video/mp4");
    }
}
