//! JSON-file local store.
//!
//! Layout under the data directory:
//!
//! ```text
//! account.json       local account
//! files.json         every LocalFile record, keyed by id
//! last_synced.json   SyncMarker
//! documents/<id>     raw document content
//! ```
//!
//! Every write goes to a temporary file first and is renamed into place.
//! Record files are owner read/write only on Unix. Changes to `files.json`
//! hold an advisory lock on `files.lock`, so a CLI edit and a running sync
//! in another process never overwrite each other.

use async_trait::async_trait;
use filesync_types::{Account, FileId};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, MutexGuard};

use super::{LocalFile, LocalStore, StoreError, SyncMarker};
use crate::fsutil::{temp_path_for, FileLock};

const ACCOUNT_FILE: &str = "account.json";
const FILES_FILE: &str = "files.json";
const FILES_LOCK: &str = "files.lock";
const MARKER_FILE: &str = "last_synced.json";
const DOCUMENTS_DIR: &str = "documents";

/// Local store backed by JSON files in a directory.
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    // Serializes read-modify-write of files.json.
    records: Mutex<()>,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub async fn open(root: &Path) -> Result<Self, StoreError> {
        let documents = root.join(DOCUMENTS_DIR);
        tokio::fs::create_dir_all(&documents)
            .await
            .map_err(|e| io_error(&documents, e))?;
        Ok(Self {
            root: root.to_path_buf(),
            records: Mutex::new(()),
        })
    }

    /// The directory this store lives in.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Hold both the in-process and the cross-process lock on the records.
    async fn lock_records(&self) -> Result<(MutexGuard<'_, ()>, FileLock), StoreError> {
        let local = self.records.lock().await;
        let path = self.root.join(FILES_LOCK);
        let file = FileLock::acquire(&path)
            .await
            .map_err(|e| io_error(&path, e))?;
        Ok((local, file))
    }

    fn document_path(&self, id: FileId) -> PathBuf {
        self.root.join(DOCUMENTS_DIR).join(id.to_string())
    }

    async fn load_records(&self) -> Result<BTreeMap<FileId, LocalFile>, StoreError> {
        Ok(read_json(&self.root.join(FILES_FILE))
            .await?
            .unwrap_or_default())
    }

    async fn save_records(&self, records: &BTreeMap<FileId, LocalFile>) -> Result<(), StoreError> {
        write_json(&self.root.join(FILES_FILE), records).await
    }
}

#[async_trait]
impl LocalStore for FileStore {
    async fn account(&self) -> Result<Option<Account>, StoreError> {
        read_json(&self.root.join(ACCOUNT_FILE)).await
    }

    async fn set_account(&self, account: &Account) -> Result<(), StoreError> {
        write_json(&self.root.join(ACCOUNT_FILE), account).await
    }

    async fn get(&self, id: FileId) -> Result<Option<LocalFile>, StoreError> {
        let _guard = self.lock_records().await?;
        Ok(self.load_records().await?.remove(&id))
    }

    async fn all(&self) -> Result<Vec<LocalFile>, StoreError> {
        let _guard = self.lock_records().await?;
        Ok(self.load_records().await?.into_values().collect())
    }

    async fn upsert(&self, file: LocalFile) -> Result<(), StoreError> {
        let _guard = self.lock_records().await?;
        let mut records = self.load_records().await?;
        records.insert(file.metadata.id, file);
        self.save_records(&records).await
    }

    async fn remove(&self, id: FileId) -> Result<(), StoreError> {
        let _guard = self.lock_records().await?;
        let mut records = self.load_records().await?;
        if records.remove(&id).is_some() {
            self.save_records(&records).await?;
        }
        let path = self.document_path(id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(&path, e)),
        }
    }

    async fn read_document(&self, id: FileId) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.document_path(id);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(&path, e)),
        }
    }

    async fn write_document(&self, id: FileId, content: &[u8]) -> Result<(), StoreError> {
        write_atomic(&self.document_path(id), content).await
    }

    async fn replace_if_unchanged(
        &self,
        id: FileId,
        expected: Option<&LocalFile>,
        new: Option<LocalFile>,
        content: Option<&[u8]>,
    ) -> Result<bool, StoreError> {
        let _guard = self.lock_records().await?;
        let mut records = self.load_records().await?;
        if records.get(&id) != expected {
            return Ok(false);
        }
        match new {
            Some(file) => {
                if let Some(content) = content {
                    write_atomic(&self.document_path(id), content).await?;
                }
                records.insert(id, file);
                self.save_records(&records).await?;
            }
            None => {
                records.remove(&id);
                self.save_records(&records).await?;
                let path = self.document_path(id);
                match tokio::fs::remove_file(&path).await {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(io_error(&path, e)),
                }
            }
        }
        Ok(true)
    }

    async fn last_synced(&self) -> Result<SyncMarker, StoreError> {
        Ok(read_json(&self.root.join(MARKER_FILE))
            .await?
            .unwrap_or_default())
    }

    async fn set_last_synced(&self, marker: SyncMarker) -> Result<(), StoreError> {
        write_json(&self.root.join(MARKER_FILE), &marker).await
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_error(path, e)),
    };
    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|e| StoreError::Serialization(format!("{}: {}", path.display(), e)))
}

async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    let contents =
        serde_json::to_vec_pretty(value).map_err(|e| StoreError::Serialization(e.to_string()))?;
    write_atomic(path, &contents).await
}

async fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    let tmp = temp_path_for(path);
    tokio::fs::write(&tmp, contents)
        .await
        .map_err(|e| io_error(&tmp, e))?;
    set_file_permissions_0600(&tmp).await?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| io_error(path, e))
}

/// Set file permissions to 0600 (owner read/write only) on Unix.
/// No-op on non-Unix platforms.
async fn set_file_permissions_0600(path: &Path) -> Result<(), StoreError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .await
            .map_err(|e| io_error(path, e))?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{create_document, delete_file};
    use filesync_types::{FileMetadata, FileType, Watermark};
    use tempfile::tempdir;

    #[tokio::test]
    async fn empty_store_has_no_account() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        assert!(store.account().await.unwrap().is_none());
        assert!(store.all().await.unwrap().is_empty());
        assert_eq!(store.last_synced().await.unwrap(), SyncMarker::default());
    }

    #[tokio::test]
    async fn records_survive_reopen() {
        let dir = tempdir().unwrap();
        let id = {
            let store = FileStore::open(dir.path()).await.unwrap();
            store
                .set_account(&Account::new("alice", "/srv"))
                .await
                .unwrap();
            create_document(&store, "notes.md", b"hello").await.unwrap()
        };

        let store = FileStore::open(dir.path()).await.unwrap();
        assert_eq!(store.account().await.unwrap().unwrap().username, "alice");
        let file = store.get(id).await.unwrap().unwrap();
        assert_eq!(file.metadata.name, "notes.md");
        assert_eq!(
            store.read_document(id).await.unwrap(),
            Some(b"hello".to_vec())
        );
    }

    #[tokio::test]
    async fn remove_deletes_record_and_content() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        let id = create_document(&store, "a", b"x").await.unwrap();

        store.remove(id).await.unwrap();
        store.remove(id).await.unwrap();

        assert!(store.get(id).await.unwrap().is_none());
        assert!(store.read_document(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn marker_roundtrip() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        let marker = SyncMarker {
            watermark: Watermark::new(12),
            synced_at: 1_700_000_000,
        };
        store.set_last_synced(marker).await.unwrap();
        assert_eq!(store.last_synced().await.unwrap(), marker);
    }

    #[tokio::test]
    async fn local_changes_from_disk() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        let mut clean = LocalFile::pulled(FileMetadata::new("clean", FileType::Folder));
        clean.metadata.metadata_version = 3;
        let clean_id = clean.metadata.id;
        store.upsert(clean).await.unwrap();
        assert!(store.local_changes().await.unwrap().is_empty());

        delete_file(&store, clean_id).await.unwrap();
        assert_eq!(store.local_changes().await.unwrap(), vec![clean_id]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn edits_through_separate_handles_all_land() {
        let dir = tempdir().unwrap();
        let first = FileStore::open(dir.path()).await.unwrap();
        let ids: Vec<FileId> = {
            let mut ids = Vec::new();
            for name in ["a", "b", "c", "d", "e", "f"] {
                ids.push(create_document(&first, name, b"v1").await.unwrap());
            }
            ids
        };

        let mut tasks = Vec::new();
        for (i, id) in ids.iter().copied().enumerate() {
            let root = dir.path().to_path_buf();
            tasks.push(tokio::spawn(async move {
                // A fresh handle per task, like separate CLI processes.
                let store = FileStore::open(&root).await.unwrap();
                let content = format!("edit {}", i);
                crate::store::edit_document(&store, id, content.as_bytes())
                    .await
                    .unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let records = first.all().await.unwrap();
        assert_eq!(records.len(), ids.len());
        assert!(records.iter().all(|f| f.generation == 1));
    }

    #[tokio::test]
    async fn stale_replace_leaves_disk_untouched() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        let id = create_document(&store, "a", b"v1").await.unwrap();
        let stale = store.get(id).await.unwrap().unwrap();
        crate::store::edit_document(&store, id, b"v2").await.unwrap();

        assert!(!store
            .replace_if_unchanged(id, Some(&stale), None, None)
            .await
            .unwrap());
        assert_eq!(store.read_document(id).await.unwrap(), Some(b"v2".to_vec()));
    }

    #[tokio::test]
    async fn corrupt_records_are_reported() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        tokio::fs::write(dir.path().join(FILES_FILE), b"{not json")
            .await
            .unwrap();
        assert!(matches!(
            store.all().await,
            Err(StoreError::Serialization(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn record_file_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        store
            .set_account(&Account::new("alice", "/srv"))
            .await
            .unwrap();

        let perms = tokio::fs::metadata(dir.path().join(ACCOUNT_FILE))
            .await
            .unwrap()
            .permissions();
        assert_eq!(perms.mode() & 0o777, 0o600, "file should be 0600");
    }
}
