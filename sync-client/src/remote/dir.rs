//! A shared directory acting as the server.
//!
//! Layout under the server root:
//!
//! ```text
//! <username>/index.msgpack    ServerIndex, MessagePack encoded
//! <username>/index.lock       advisory lock held around every index access
//! <username>/content/<id>     current document content
//! ```
//!
//! A missing root is reported as `CouldNotReachServer`, the same way an
//! unmounted network share would look. Every call holds the account's
//! `index.lock`, so clients in separate processes sharing one directory
//! never lose each other's pushes.

use async_trait::async_trait;
use filesync_types::{Account, FileId, FileMetadata, Watermark};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use super::{Remote, RemoteError, ServerIndex};
use crate::fsutil::{temp_path_for, FileLock};

const INDEX_FILE: &str = "index.msgpack";
const INDEX_LOCK: &str = "index.lock";
const CONTENT_DIR: &str = "content";

/// Directory-backed remote.
#[derive(Debug)]
pub struct DirRemote {
    root: PathBuf,
    lock: Mutex<()>,
}

impl DirRemote {
    /// Create a remote rooted at an existing directory.
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    /// The server root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn account_dir(&self, account: &Account) -> Result<PathBuf, RemoteError> {
        if account.username.is_empty()
            || account.username.contains(['/', '\\'])
            || account.username.starts_with('.')
        {
            return Err(RemoteError::Rejected(format!(
                "invalid username: {:?}",
                account.username
            )));
        }
        match tokio::fs::metadata(&self.root).await {
            Ok(meta) if meta.is_dir() => {}
            _ => {
                return Err(RemoteError::CouldNotReachServer(format!(
                    "{} is not reachable",
                    self.root.display()
                )))
            }
        }
        let dir = self.root.join(&account.username);
        tokio::fs::create_dir_all(dir.join(CONTENT_DIR))
            .await
            .map_err(|e| storage_error(&dir, e))?;
        Ok(dir)
    }

    /// The account directory, with its index lock held.
    async fn locked_account_dir(
        &self,
        account: &Account,
    ) -> Result<(PathBuf, FileLock), RemoteError> {
        let dir = self.account_dir(account).await?;
        let path = dir.join(INDEX_LOCK);
        let lock = FileLock::acquire(&path)
            .await
            .map_err(|e| storage_error(&path, e))?;
        Ok((dir, lock))
    }

    async fn load_index(&self, dir: &Path) -> Result<ServerIndex, RemoteError> {
        let path = dir.join(INDEX_FILE);
        match tokio::fs::read(&path).await {
            Ok(bytes) => rmp_serde::from_slice(&bytes)
                .map_err(|e| RemoteError::Storage(format!("{}: {}", path.display(), e))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ServerIndex::default()),
            Err(e) => Err(storage_error(&path, e)),
        }
    }

    async fn save_index(&self, dir: &Path, index: &ServerIndex) -> Result<(), RemoteError> {
        let bytes = rmp_serde::to_vec_named(index)
            .map_err(|e| RemoteError::Storage(format!("encode index: {}", e)))?;
        write_atomic(&dir.join(INDEX_FILE), &bytes).await
    }
}

#[async_trait]
impl Remote for DirRemote {
    async fn get_updates(
        &self,
        account: &Account,
        since: Watermark,
    ) -> Result<Vec<FileMetadata>, RemoteError> {
        let _guard = self.lock.lock().await;
        let (dir, _index_lock) = self.locked_account_dir(account).await?;
        Ok(self.load_index(&dir).await?.updates_since(since))
    }

    async fn get_metadata(
        &self,
        account: &Account,
        id: FileId,
    ) -> Result<Option<FileMetadata>, RemoteError> {
        let _guard = self.lock.lock().await;
        let (dir, _index_lock) = self.locked_account_dir(account).await?;
        Ok(self.load_index(&dir).await?.files.remove(&id))
    }

    async fn push_metadata(
        &self,
        account: &Account,
        metadata: &FileMetadata,
    ) -> Result<u64, RemoteError> {
        let _guard = self.lock.lock().await;
        let (dir, _index_lock) = self.locked_account_dir(account).await?;
        let mut index = self.load_index(&dir).await?;
        let version = index.apply_metadata(metadata);
        self.save_index(&dir, &index).await?;
        if metadata.deleted {
            let path = dir.join(CONTENT_DIR).join(metadata.id.to_string());
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(storage_error(&path, e)),
            }
        }
        Ok(version)
    }

    async fn push_document(
        &self,
        account: &Account,
        id: FileId,
        content: &[u8],
        digest: &str,
    ) -> Result<u64, RemoteError> {
        let _guard = self.lock.lock().await;
        let (dir, _index_lock) = self.locked_account_dir(account).await?;
        let mut index = self.load_index(&dir).await?;
        let version = index.apply_document(id, digest)?;
        // Content lands before the index so a reader never sees a version
        // whose bytes are missing.
        write_atomic(&dir.join(CONTENT_DIR).join(id.to_string()), content).await?;
        self.save_index(&dir, &index).await?;
        Ok(version)
    }

    async fn get_document(&self, account: &Account, id: FileId) -> Result<Vec<u8>, RemoteError> {
        let _guard = self.lock.lock().await;
        let (dir, _index_lock) = self.locked_account_dir(account).await?;
        let path = dir.join(CONTENT_DIR).join(id.to_string());
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(RemoteError::NotFound(id)),
            Err(e) => Err(storage_error(&path, e)),
        }
    }
}

fn storage_error(path: &Path, e: std::io::Error) -> RemoteError {
    RemoteError::Storage(format!("{}: {}", path.display(), e))
}

async fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), RemoteError> {
    let tmp = temp_path_for(path);
    tokio::fs::write(&tmp, contents)
        .await
        .map_err(|e| storage_error(&tmp, e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| storage_error(path, e))
}
