//! Local metadata and content store.
//!
//! The store holds one [`LocalFile`] record per file plus document content,
//! the local account and the last-synced marker. Implementations serialize
//! conflicting reads and writes themselves; the orchestrator never locks
//! file records.
//!
//! Local edits and sync results race on the same records. Both go through
//! [`LocalStore::replace_if_unchanged`], so a write based on a stale read
//! is refused instead of overwriting the newer record.
//!
//! - [`MemoryStore`]: in-process, for tests and embedding
//! - [`FileStore`]: JSON files under a data directory

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use filesync_types::{Account, FileId, FileMetadata, FileType, Watermark};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure.
    #[error("i/o error on {path}: {source}")]
    Io {
        /// File being accessed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A record could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Any other backend failure.
    #[error("store backend error: {0}")]
    Backend(String),
}

/// One file as known locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalFile {
    /// Metadata, including the server versions last synced.
    pub metadata: FileMetadata,
    /// True if there are metadata changes (new, rename, delete) to push.
    pub metadata_changed: bool,
    /// True if there are content changes to push.
    pub document_edited: bool,
    /// Bumped on every local edit, so two reads differ even when the
    /// flags were already set.
    #[serde(default)]
    pub generation: u64,
}

impl LocalFile {
    /// A file created locally and never pushed.
    pub fn created(metadata: FileMetadata) -> Self {
        let document_edited = metadata.is_document();
        Self {
            metadata,
            metadata_changed: true,
            document_edited,
            generation: 0,
        }
    }

    /// A file just pulled from the server.
    pub fn pulled(metadata: FileMetadata) -> Self {
        Self {
            metadata,
            metadata_changed: false,
            document_edited: false,
            generation: 0,
        }
    }

    /// Check if anything about this file still needs pushing.
    pub fn has_local_changes(&self) -> bool {
        self.metadata_changed || self.document_edited
    }
}

/// The last point up to which local state is known to match the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SyncMarker {
    /// Server watermark from the last successful sync.
    pub watermark: Watermark,
    /// Unix seconds of the last successful sync (0 = never).
    pub synced_at: u64,
}

/// Read/write access to local file records, content and sync markers.
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// The local account, if one exists.
    async fn account(&self) -> Result<Option<Account>, StoreError>;

    /// Create or replace the local account.
    async fn set_account(&self, account: &Account) -> Result<(), StoreError>;

    /// One file record.
    async fn get(&self, id: FileId) -> Result<Option<LocalFile>, StoreError>;

    /// Every file record, in no particular order.
    async fn all(&self) -> Result<Vec<LocalFile>, StoreError>;

    /// Insert or replace a file record.
    async fn upsert(&self, file: LocalFile) -> Result<(), StoreError>;

    /// Remove a file record and its content. Removing a missing file is not an error.
    async fn remove(&self, id: FileId) -> Result<(), StoreError>;

    /// Document content, if any has been written.
    async fn read_document(&self, id: FileId) -> Result<Option<Vec<u8>>, StoreError>;

    /// Replace document content.
    async fn write_document(&self, id: FileId, content: &[u8]) -> Result<(), StoreError>;

    /// Atomically replace the record for `id` if it still equals `expected`.
    ///
    /// `None` means no record on either side; replacing with `None` also
    /// drops the content. `content`, if given, is written in the same step.
    /// Returns false and changes nothing if the record moved on.
    async fn replace_if_unchanged(
        &self,
        id: FileId,
        expected: Option<&LocalFile>,
        new: Option<LocalFile>,
        content: Option<&[u8]>,
    ) -> Result<bool, StoreError>;

    /// The last-synced marker.
    async fn last_synced(&self) -> Result<SyncMarker, StoreError>;

    /// Persist a new last-synced marker.
    async fn set_last_synced(&self, marker: SyncMarker) -> Result<(), StoreError>;

    /// Ids of files with unpushed metadata or content changes, sorted.
    async fn local_changes(&self) -> Result<Vec<FileId>, StoreError> {
        let mut ids: Vec<FileId> = self
            .all()
            .await?
            .into_iter()
            .filter(LocalFile::has_local_changes)
            .map(|f| f.metadata.id)
            .collect();
        ids.sort();
        Ok(ids)
    }

    /// First live (not deleted) file with the given name.
    async fn find_by_name(&self, name: &str) -> Result<Option<LocalFile>, StoreError> {
        let mut matches: Vec<LocalFile> = self
            .all()
            .await?
            .into_iter()
            .filter(|f| !f.metadata.deleted && f.metadata.name == name)
            .collect();
        matches.sort_by_key(|f| f.metadata.id);
        Ok(matches.into_iter().next())
    }
}

/// Create a document locally. It will be pushed on the next sync.
pub async fn create_document<S: LocalStore + ?Sized>(
    store: &S,
    name: &str,
    content: &[u8],
) -> Result<FileId, StoreError> {
    let file = LocalFile::created(FileMetadata::new(name, FileType::Document));
    let id = file.metadata.id;
    insert_new(store, file, Some(content)).await?;
    Ok(id)
}

/// Create a folder locally. It will be pushed on the next sync.
pub async fn create_folder<S: LocalStore + ?Sized>(
    store: &S,
    name: &str,
) -> Result<FileId, StoreError> {
    let file = LocalFile::created(FileMetadata::new(name, FileType::Folder));
    let id = file.metadata.id;
    insert_new(store, file, None).await?;
    Ok(id)
}

/// Replace a document's content locally and mark it for pushing.
pub async fn edit_document<S: LocalStore + ?Sized>(
    store: &S,
    id: FileId,
    content: &[u8],
) -> Result<(), StoreError> {
    modify(store, id, Some(content), |file| file.document_edited = true).await
}

/// Mark a file deleted locally. The deletion is pushed on the next sync.
pub async fn delete_file<S: LocalStore + ?Sized>(store: &S, id: FileId) -> Result<(), StoreError> {
    modify(store, id, None, |file| {
        file.metadata.deleted = true;
        file.metadata_changed = true;
        file.document_edited = false;
    })
    .await
}

async fn insert_new<S: LocalStore + ?Sized>(
    store: &S,
    file: LocalFile,
    content: Option<&[u8]>,
) -> Result<(), StoreError> {
    let id = file.metadata.id;
    if store
        .replace_if_unchanged(id, None, Some(file), content)
        .await?
    {
        Ok(())
    } else {
        Err(StoreError::Backend(format!("file already exists: {}", id)))
    }
}

/// Apply a local edit, retrying until it lands on the current record.
async fn modify<S, F>(
    store: &S,
    id: FileId,
    content: Option<&[u8]>,
    edit: F,
) -> Result<(), StoreError>
where
    S: LocalStore + ?Sized,
    F: Fn(&mut LocalFile),
{
    loop {
        let current = store
            .get(id)
            .await?
            .ok_or_else(|| StoreError::Backend(format!("no such file: {}", id)))?;
        let mut edited = current.clone();
        edit(&mut edited);
        edited.generation += 1;
        if store
            .replace_if_unchanged(id, Some(&current), Some(edited), content)
            .await?
        {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn created_document_needs_content_push() {
        let file = LocalFile::created(FileMetadata::new("a", FileType::Document));
        assert!(file.metadata_changed);
        assert!(file.document_edited);
        assert!(file.has_local_changes());
    }

    #[test]
    fn created_folder_is_metadata_only() {
        let file = LocalFile::created(FileMetadata::new("dir", FileType::Folder));
        assert!(file.metadata_changed);
        assert!(!file.document_edited);
    }

    #[test]
    fn pulled_file_is_clean() {
        let file = LocalFile::pulled(FileMetadata::new("a", FileType::Document));
        assert!(!file.has_local_changes());
    }

    #[tokio::test]
    async fn helpers_track_local_changes() {
        let store = MemoryStore::new();
        let doc = create_document(&store, "notes.md", b"hi").await.unwrap();
        let dir = create_folder(&store, "dir").await.unwrap();

        let mut expected = vec![doc, dir];
        expected.sort();
        assert_eq!(store.local_changes().await.unwrap(), expected);
        assert_eq!(
            store.read_document(doc).await.unwrap(),
            Some(b"hi".to_vec())
        );
    }

    #[tokio::test]
    async fn delete_marks_metadata_change() {
        let store = MemoryStore::new();
        let mut file = LocalFile::pulled(FileMetadata::new("a", FileType::Document));
        file.metadata.metadata_version = 4;
        let id = file.metadata.id;
        store.upsert(file).await.unwrap();

        delete_file(&store, id).await.unwrap();

        let file = store.get(id).await.unwrap().unwrap();
        assert!(file.metadata.deleted);
        assert!(file.metadata_changed);
        assert!(!file.document_edited);
        assert!(store.find_by_name("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn every_edit_changes_the_record() {
        let store = MemoryStore::new();
        let id = create_document(&store, "a", b"v1").await.unwrap();
        let before = store.get(id).await.unwrap().unwrap();

        edit_document(&store, id, b"v2").await.unwrap();

        let after = store.get(id).await.unwrap().unwrap();
        assert!(before.document_edited && after.document_edited);
        assert_ne!(before, after);
        assert_eq!(after.generation, before.generation + 1);
    }

    #[tokio::test]
    async fn stale_replace_is_refused() {
        let store = MemoryStore::new();
        let id = create_document(&store, "a", b"v1").await.unwrap();
        let stale = store.get(id).await.unwrap().unwrap();
        edit_document(&store, id, b"v2").await.unwrap();

        let mut clean = stale.clone();
        clean.document_edited = false;
        assert!(!store
            .replace_if_unchanged(id, Some(&stale), Some(clean), Some(&b"old"[..]))
            .await
            .unwrap());

        let current = store.get(id).await.unwrap().unwrap();
        assert!(current.document_edited);
        assert_eq!(store.read_document(id).await.unwrap(), Some(b"v2".to_vec()));
    }

    #[tokio::test]
    async fn create_with_taken_id_fails() {
        let store = MemoryStore::new();
        let file = LocalFile::created(FileMetadata::new("a", FileType::Folder));
        insert_new(&store, file.clone(), None).await.unwrap();
        assert!(insert_new(&store, file, None).await.is_err());
    }

    #[tokio::test]
    async fn edit_missing_document_fails() {
        let store = MemoryStore::new();
        assert!(edit_document(&store, FileId::new(), b"x").await.is_err());
    }
}
