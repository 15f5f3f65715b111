//! In-memory local store.
//!
//! Clones share state, so a test can keep a handle for inspection while the
//! sync service owns another.

use async_trait::async_trait;
use filesync_types::{Account, FileId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{LocalFile, LocalStore, StoreError, SyncMarker};

/// In-memory store.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryStoreInner>>,
}

#[derive(Debug, Default)]
struct MemoryStoreInner {
    account: Option<Account>,
    files: HashMap<FileId, LocalFile>,
    documents: HashMap<FileId, Vec<u8>>,
    marker: SyncMarker,
    fail_next_upsert: Option<String>,
    fail_next_set_last_synced: Option<String>,
}

impl MemoryStore {
    /// Create an empty store with no account.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store holding `account`.
    pub fn with_account(account: Account) -> Self {
        let store = Self::new();
        store.lock().account = Some(account);
        store
    }

    /// Cause the next record write (`upsert()` or `replace_if_unchanged()`)
    /// to fail with the given message.
    pub fn fail_next_upsert(&self, error: &str) {
        self.lock().fail_next_upsert = Some(error.to_string());
    }

    /// Cause the next `set_last_synced()` to fail with the given message.
    pub fn fail_next_set_last_synced(&self, error: &str) {
        self.lock().fail_next_set_last_synced = Some(error.to_string());
    }

    fn lock(&self) -> MutexGuard<'_, MemoryStoreInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl LocalStore for MemoryStore {
    async fn account(&self) -> Result<Option<Account>, StoreError> {
        Ok(self.lock().account.clone())
    }

    async fn set_account(&self, account: &Account) -> Result<(), StoreError> {
        self.lock().account = Some(account.clone());
        Ok(())
    }

    async fn get(&self, id: FileId) -> Result<Option<LocalFile>, StoreError> {
        Ok(self.lock().files.get(&id).cloned())
    }

    async fn all(&self) -> Result<Vec<LocalFile>, StoreError> {
        Ok(self.lock().files.values().cloned().collect())
    }

    async fn upsert(&self, file: LocalFile) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if let Some(error) = inner.fail_next_upsert.take() {
            return Err(StoreError::Backend(error));
        }
        inner.files.insert(file.metadata.id, file);
        Ok(())
    }

    async fn remove(&self, id: FileId) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.files.remove(&id);
        inner.documents.remove(&id);
        Ok(())
    }

    async fn read_document(&self, id: FileId) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.lock().documents.get(&id).cloned())
    }

    async fn write_document(&self, id: FileId, content: &[u8]) -> Result<(), StoreError> {
        self.lock().documents.insert(id, content.to_vec());
        Ok(())
    }

    async fn replace_if_unchanged(
        &self,
        id: FileId,
        expected: Option<&LocalFile>,
        new: Option<LocalFile>,
        content: Option<&[u8]>,
    ) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        if let Some(error) = inner.fail_next_upsert.take() {
            return Err(StoreError::Backend(error));
        }
        if inner.files.get(&id) != expected {
            return Ok(false);
        }
        match new {
            Some(file) => {
                if let Some(content) = content {
                    inner.documents.insert(id, content.to_vec());
                }
                inner.files.insert(id, file);
            }
            None => {
                inner.files.remove(&id);
                inner.documents.remove(&id);
            }
        }
        Ok(true)
    }

    async fn last_synced(&self) -> Result<SyncMarker, StoreError> {
        Ok(self.lock().marker)
    }

    async fn set_last_synced(&self, marker: SyncMarker) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if let Some(error) = inner.fail_next_set_last_synced.take() {
            return Err(StoreError::Backend(error));
        }
        inner.marker = marker;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filesync_types::{FileMetadata, FileType, Watermark};

    #[tokio::test]
    async fn clones_share_state() {
        let store = MemoryStore::new();
        let other = store.clone();
        let file = LocalFile::created(FileMetadata::new("a", FileType::Folder));
        let id = file.metadata.id;
        store.upsert(file).await.unwrap();
        assert!(other.get(id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn remove_drops_content() {
        let store = MemoryStore::new();
        let file = LocalFile::created(FileMetadata::new("a", FileType::Document));
        let id = file.metadata.id;
        store.upsert(file).await.unwrap();
        store.write_document(id, b"x").await.unwrap();

        store.remove(id).await.unwrap();
        store.remove(id).await.unwrap();

        assert!(store.get(id).await.unwrap().is_none());
        assert!(store.read_document(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn injected_failure_fires_once() {
        let store = MemoryStore::new();
        store.fail_next_upsert("disk full");
        let file = LocalFile::created(FileMetadata::new("a", FileType::Folder));
        assert!(store.upsert(file.clone()).await.is_err());
        assert!(store.upsert(file).await.is_ok());
    }

    #[tokio::test]
    async fn marker_defaults_to_never() {
        let store = MemoryStore::with_account(Account::new("alice", "mem://"));
        assert_eq!(store.last_synced().await.unwrap(), SyncMarker::default());
        store
            .set_last_synced(SyncMarker {
                watermark: Watermark::new(5),
                synced_at: 100,
            })
            .await
            .unwrap();
        assert_eq!(
            store.last_synced().await.unwrap().watermark,
            Watermark::new(5)
        );
    }
}
