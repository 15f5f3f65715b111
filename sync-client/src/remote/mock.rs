//! Mock remote for testing.
//!
//! An in-memory server shared by every clone, so two clients built on
//! clones of one `MockRemote` see each other's pushes. Failures can be
//! injected per call.

use async_trait::async_trait;
use filesync_types::{Account, FileId, FileMetadata, Watermark};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{Remote, RemoteError, ServerIndex};

/// Mock remote for testing.
#[derive(Debug, Default, Clone)]
pub struct MockRemote {
    inner: Arc<Mutex<MockRemoteInner>>,
}

#[derive(Debug, Default)]
struct MockRemoteInner {
    indexes: HashMap<String, ServerIndex>,
    contents: HashMap<(String, FileId), Vec<u8>>,
    offline: bool,
    client_update_required: bool,
    fail_next_get_updates: Option<RemoteError>,
    fail_next_push: Option<RemoteError>,
    fail_next_get_document: Option<RemoteError>,
    corrupt_next_document: bool,
    get_updates_calls: usize,
    push_calls: usize,
}

impl MockRemote {
    /// Create an empty server.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with `CouldNotReachServer` until turned back on.
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Make every call fail with `ClientUpdateRequired`.
    pub fn set_client_update_required(&self, required: bool) {
        self.lock().client_update_required = required;
    }

    /// Cause the next `get_updates()` to fail with the given error.
    pub fn fail_next_get_updates(&self, error: RemoteError) {
        self.lock().fail_next_get_updates = Some(error);
    }

    /// Cause the next `push_metadata()` or `push_document()` to fail.
    pub fn fail_next_push(&self, error: RemoteError) {
        self.lock().fail_next_push = Some(error);
    }

    /// Cause the next `get_document()` to fail with the given error.
    pub fn fail_next_get_document(&self, error: RemoteError) {
        self.lock().fail_next_get_document = Some(error);
    }

    /// Flip a byte in the next document served.
    pub fn corrupt_next_document(&self) {
        self.lock().corrupt_next_document = true;
    }

    /// Number of `get_updates()` calls so far.
    pub fn get_updates_calls(&self) -> usize {
        self.lock().get_updates_calls
    }

    /// Number of push calls (metadata or content) that reached the server.
    pub fn push_calls(&self) -> usize {
        self.lock().push_calls
    }

    /// Current server metadata for a file, bypassing failure injection.
    pub fn server_file(&self, account: &Account, id: FileId) -> Option<FileMetadata> {
        self.lock()
            .indexes
            .get(&account.username)
            .and_then(|index| index.files.get(&id).cloned())
    }

    /// Current server version counter for an account.
    pub fn server_version(&self, account: &Account) -> u64 {
        self.lock()
            .indexes
            .get(&account.username)
            .map_or(0, |index| index.version)
    }

    fn lock(&self) -> MutexGuard<'_, MockRemoteInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl MockRemoteInner {
    fn check_reachable(&self) -> Result<(), RemoteError> {
        if self.offline {
            return Err(RemoteError::CouldNotReachServer("mock offline".into()));
        }
        if self.client_update_required {
            return Err(RemoteError::ClientUpdateRequired);
        }
        Ok(())
    }
}

#[async_trait]
impl Remote for MockRemote {
    async fn get_updates(
        &self,
        account: &Account,
        since: Watermark,
    ) -> Result<Vec<FileMetadata>, RemoteError> {
        let mut inner = self.lock();
        inner.get_updates_calls += 1;
        inner.check_reachable()?;
        if let Some(error) = inner.fail_next_get_updates.take() {
            return Err(error);
        }
        Ok(inner
            .indexes
            .get(&account.username)
            .map(|index| index.updates_since(since))
            .unwrap_or_default())
    }

    async fn get_metadata(
        &self,
        account: &Account,
        id: FileId,
    ) -> Result<Option<FileMetadata>, RemoteError> {
        let inner = self.lock();
        inner.check_reachable()?;
        Ok(inner
            .indexes
            .get(&account.username)
            .and_then(|index| index.files.get(&id).cloned()))
    }

    async fn push_metadata(
        &self,
        account: &Account,
        metadata: &FileMetadata,
    ) -> Result<u64, RemoteError> {
        let mut inner = self.lock();
        inner.check_reachable()?;
        if let Some(error) = inner.fail_next_push.take() {
            return Err(error);
        }
        inner.push_calls += 1;
        if metadata.deleted {
            inner
                .contents
                .remove(&(account.username.clone(), metadata.id));
        }
        Ok(inner
            .indexes
            .entry(account.username.clone())
            .or_default()
            .apply_metadata(metadata))
    }

    async fn push_document(
        &self,
        account: &Account,
        id: FileId,
        content: &[u8],
        digest: &str,
    ) -> Result<u64, RemoteError> {
        let mut inner = self.lock();
        inner.check_reachable()?;
        if let Some(error) = inner.fail_next_push.take() {
            return Err(error);
        }
        inner.push_calls += 1;
        let version = inner
            .indexes
            .entry(account.username.clone())
            .or_default()
            .apply_document(id, digest)?;
        inner
            .contents
            .insert((account.username.clone(), id), content.to_vec());
        Ok(version)
    }

    async fn get_document(&self, account: &Account, id: FileId) -> Result<Vec<u8>, RemoteError> {
        let mut inner = self.lock();
        inner.check_reachable()?;
        if let Some(error) = inner.fail_next_get_document.take() {
            return Err(error);
        }
        let mut content = inner
            .contents
            .get(&(account.username.clone(), id))
            .cloned()
            .ok_or(RemoteError::NotFound(id))?;
        if std::mem::take(&mut inner.corrupt_next_document) {
            match content.first_mut() {
                Some(byte) => *byte ^= 0xFF,
                None => content.push(0),
            }
        }
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filesync_types::{content_digest, FileType};

    fn alice() -> Account {
        Account::new("alice", "mock://")
    }

    #[tokio::test]
    async fn pushes_are_visible_to_clones() {
        let remote = MockRemote::new();
        let other = remote.clone();
        let meta = FileMetadata::new("a", FileType::Document);

        remote.push_metadata(&alice(), &meta).await.unwrap();
        remote
            .push_document(&alice(), meta.id, b"hi", &content_digest(b"hi"))
            .await
            .unwrap();

        let updates = other.get_updates(&alice(), Watermark::zero()).await.unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(other.get_document(&alice(), meta.id).await.unwrap(), b"hi");
    }

    #[tokio::test]
    async fn accounts_are_isolated() {
        let remote = MockRemote::new();
        let meta = FileMetadata::new("a", FileType::Folder);
        remote.push_metadata(&alice(), &meta).await.unwrap();

        let bob = Account::new("bob", "mock://");
        assert!(remote
            .get_updates(&bob, Watermark::zero())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn offline_fails_every_call() {
        let remote = MockRemote::new();
        remote.set_offline(true);
        assert!(matches!(
            remote.get_updates(&alice(), Watermark::zero()).await,
            Err(RemoteError::CouldNotReachServer(_))
        ));
        remote.set_offline(false);
        assert!(remote.get_updates(&alice(), Watermark::zero()).await.is_ok());
        assert_eq!(remote.get_updates_calls(), 2);
    }

    #[tokio::test]
    async fn corrupt_document_fires_once() {
        let remote = MockRemote::new();
        let meta = FileMetadata::new("a", FileType::Document);
        remote.push_metadata(&alice(), &meta).await.unwrap();
        remote
            .push_document(&alice(), meta.id, b"abc", "d")
            .await
            .unwrap();

        remote.corrupt_next_document();
        assert_ne!(remote.get_document(&alice(), meta.id).await.unwrap(), b"abc");
        assert_eq!(remote.get_document(&alice(), meta.id).await.unwrap(), b"abc");
    }

    #[tokio::test]
    async fn failed_push_is_not_counted() {
        let remote = MockRemote::new();
        remote.fail_next_push(RemoteError::Rejected("nope".into()));
        let meta = FileMetadata::new("a", FileType::Folder);
        assert!(remote.push_metadata(&alice(), &meta).await.is_err());
        assert_eq!(remote.push_calls(), 0);
        assert_eq!(remote.server_version(&alice()), 0);
    }
}
