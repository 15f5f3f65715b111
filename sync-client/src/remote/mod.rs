//! Remote server abstraction for filesync.
//!
//! This module provides a pluggable remote layer that abstracts where the
//! authoritative copy of each account's files lives.
//!
//! # Design
//!
//! The server assigns every accepted change a version from one monotonically
//! increasing counter per account:
//! - `get_updates()` lists files whose newest version is above a watermark
//! - `push_metadata()` / `push_document()` store a change and return its version
//! - `get_metadata()` / `get_document()` fetch one file
//!
//! Implementations:
//! - [`MockRemote`]: in-memory, with failure injection for tests
//! - [`DirRemote`]: a shared directory acting as the server

mod dir;
mod mock;

pub use dir::DirRemote;
pub use mock::MockRemote;

use async_trait::async_trait;
use filesync_types::{Account, FileId, FileMetadata, Watermark};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Remote errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The server could not be reached. Retryable.
    #[error("could not reach server: {0}")]
    CouldNotReachServer(String),

    /// The server refuses this client version.
    #[error("client update required")]
    ClientUpdateRequired,

    /// The server has no such file.
    #[error("file not found: {0}")]
    NotFound(FileId),

    /// The server rejected the request.
    #[error("request rejected: {0}")]
    Rejected(String),

    /// The server's state could not be read or written.
    #[error("server storage error: {0}")]
    Storage(String),
}

/// Access to the authoritative copy of an account's files.
#[async_trait]
pub trait Remote: Send + Sync {
    /// Files whose metadata or content version is above `since`, including
    /// deletion tombstones.
    async fn get_updates(
        &self,
        account: &Account,
        since: Watermark,
    ) -> Result<Vec<FileMetadata>, RemoteError>;

    /// Current server metadata for one file.
    async fn get_metadata(
        &self,
        account: &Account,
        id: FileId,
    ) -> Result<Option<FileMetadata>, RemoteError>;

    /// Store new metadata. Content fields of `metadata` are ignored.
    /// Returns the assigned metadata version.
    async fn push_metadata(
        &self,
        account: &Account,
        metadata: &FileMetadata,
    ) -> Result<u64, RemoteError>;

    /// Store new content for an existing document. Returns the assigned content version.
    async fn push_document(
        &self,
        account: &Account,
        id: FileId,
        content: &[u8],
        digest: &str,
    ) -> Result<u64, RemoteError>;

    /// Current content of a document.
    async fn get_document(&self, account: &Account, id: FileId) -> Result<Vec<u8>, RemoteError>;
}

/// One account's server-side file index.
///
/// Shared by the remote implementations so they agree on versioning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerIndex {
    /// Last version handed out.
    pub version: u64,
    /// Every file ever pushed, including tombstones.
    pub files: BTreeMap<FileId, FileMetadata>,
}

impl ServerIndex {
    /// Files changed after `since`, oldest change first.
    pub fn updates_since(&self, since: Watermark) -> Vec<FileMetadata> {
        let mut updates: Vec<FileMetadata> = self
            .files
            .values()
            .filter(|f| f.latest_version() > since.value())
            .cloned()
            .collect();
        updates.sort_by_key(|f| (f.latest_version(), f.id));
        updates
    }

    /// Apply a metadata push and return its version.
    ///
    /// Content fields come from the existing record, never from the client.
    /// A deletion drops the content fields and keeps a tombstone.
    pub fn apply_metadata(&mut self, metadata: &FileMetadata) -> u64 {
        self.version += 1;
        let mut stored = metadata.clone();
        stored.metadata_version = self.version;
        match self.files.get(&metadata.id) {
            Some(existing) if !metadata.deleted => {
                stored.content_version = existing.content_version;
                stored.content_digest = existing.content_digest.clone();
            }
            _ => {
                stored.content_version = 0;
                stored.content_digest = None;
            }
        }
        self.files.insert(metadata.id, stored);
        self.version
    }

    /// Apply a content push and return its version.
    pub fn apply_document(&mut self, id: FileId, digest: &str) -> Result<u64, RemoteError> {
        let file = self.files.get_mut(&id).ok_or(RemoteError::NotFound(id))?;
        if file.deleted {
            return Err(RemoteError::Rejected(format!("{} is deleted", id)));
        }
        if !file.is_document() {
            return Err(RemoteError::Rejected(format!("{} is not a document", id)));
        }
        self.version += 1;
        file.content_version = self.version;
        file.content_digest = Some(digest.to_string());
        Ok(self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filesync_types::{content_digest, FileType};

    #[test]
    fn versions_increase_per_change() {
        let mut index = ServerIndex::default();
        let meta = FileMetadata::new("a", FileType::Document);
        assert_eq!(index.apply_metadata(&meta), 1);
        assert_eq!(index.apply_document(meta.id, &content_digest(b"x")), Ok(2));
        let stored = &index.files[&meta.id];
        assert_eq!(stored.metadata_version, 1);
        assert_eq!(stored.content_version, 2);
    }

    #[test]
    fn rename_keeps_content_fields() {
        let mut index = ServerIndex::default();
        let mut meta = FileMetadata::new("a", FileType::Document);
        index.apply_metadata(&meta);
        index.apply_document(meta.id, "d").unwrap();

        meta.name = "b".into();
        meta.content_version = 0;
        index.apply_metadata(&meta);

        let stored = &index.files[&meta.id];
        assert_eq!(stored.name, "b");
        assert_eq!(stored.content_version, 2);
        assert_eq!(stored.content_digest.as_deref(), Some("d"));
    }

    #[test]
    fn deletion_leaves_tombstone() {
        let mut index = ServerIndex::default();
        let mut meta = FileMetadata::new("a", FileType::Document);
        index.apply_metadata(&meta);
        index.apply_document(meta.id, "d").unwrap();

        meta.deleted = true;
        index.apply_metadata(&meta);

        let updates = index.updates_since(Watermark::new(2));
        assert_eq!(updates.len(), 1);
        assert!(updates[0].deleted);
        assert!(index.apply_document(meta.id, "e").is_err());
    }

    #[test]
    fn content_for_unknown_file_is_not_found() {
        let mut index = ServerIndex::default();
        let id = FileId::new();
        assert_eq!(index.apply_document(id, "d"), Err(RemoteError::NotFound(id)));
    }

    #[test]
    fn updates_since_filters_and_orders() {
        let mut index = ServerIndex::default();
        let a = FileMetadata::new("a", FileType::Folder);
        let b = FileMetadata::new("b", FileType::Folder);
        index.apply_metadata(&a);
        index.apply_metadata(&b);
        index.apply_metadata(&a);

        let updates = index.updates_since(Watermark::new(1));
        let names: Vec<&str> = updates.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert!(index.updates_since(Watermark::new(3)).is_empty());
    }
}
