//! Work calculation and execution against a local store and a remote.
//!
//! [`SyncService`] is the concrete [`SyncBackend`](crate::SyncBackend):
//!
//! ```text
//! calculate_work:  store.all() + remote.get_updates(last watermark) → SyncWorkBatch
//! execute_work:    PushLocal  → remote.push_metadata / push_document → store
//!                  PullRemote → remote.get_metadata / get_document  → store
//! ```
//!
//! Store and remote failures are classified into the typed taxonomy here,
//! at the lowest layer, before they reach the orchestrator.

use async_trait::async_trait;
use filesync_types::{
    content_digest, Account, CalculateWorkError, ExecuteWorkError, FileId, FileMetadata,
    GetAccountError, SyncWorkBatch, Watermark, WorkDirection, WorkKind, WorkUnit,
};
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::backend::{AccountProvider, WatermarkStore, WorkCalculator, WorkExecutor};
use crate::remote::{Remote, RemoteError};
use crate::store::{LocalFile, LocalStore, StoreError, SyncMarker};

/// Calculates and executes sync work for one local store and one remote.
#[derive(Debug)]
pub struct SyncService<S, R> {
    store: S,
    remote: R,
}

impl<S: LocalStore, R: Remote> SyncService<S, R> {
    /// Create a service.
    pub fn new(store: S, remote: R) -> Self {
        Self { store, remote }
    }

    /// The local store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The remote.
    pub fn remote(&self) -> &R {
        &self.remote
    }

    async fn push_local(&self, account: &Account, id: FileId) -> Result<(), ExecuteWorkError> {
        let Some(mut file) = self.store.get(id).await.map_err(unexpected)? else {
            // Already pushed as a deletion and removed.
            debug!(file = %id, "push target no longer exists locally");
            return Ok(());
        };
        if !file.has_local_changes() {
            debug!(file = %id, "nothing left to push");
            return Ok(());
        }

        if file.metadata.deleted {
            if file.metadata.metadata_version > 0 {
                self.remote
                    .push_metadata(account, &file.metadata)
                    .await
                    .map_err(execute_error)?;
            }
            let removed = self
                .store
                .replace_if_unchanged(id, Some(&file), None, None)
                .await
                .map_err(unexpected)?;
            if !removed {
                debug!(file = %id, "record changed during push, keeping it");
            }
            return Ok(());
        }

        if file.metadata_changed {
            let mut pushed = file.clone();
            pushed.metadata.metadata_version = self
                .remote
                .push_metadata(account, &file.metadata)
                .await
                .map_err(execute_error)?;
            pushed.metadata_changed = false;
            match self.record_push(id, &file, pushed).await? {
                Some(current) => file = current,
                None => return Ok(()),
            }
        }

        if file.document_edited {
            let content = self
                .store
                .read_document(id)
                .await
                .map_err(unexpected)?
                .unwrap_or_default();
            let digest = content_digest(&content);
            let mut pushed = file.clone();
            let version = match self.remote.push_document(account, id, &content, &digest).await {
                Err(RemoteError::Rejected(reason)) => {
                    // Deleted on the server while edited here. The local
                    // edit wins: restore the file, then push its content.
                    debug!(file = %id, %reason, "restoring file before content push");
                    pushed.metadata.metadata_version = self
                        .remote
                        .push_metadata(account, &file.metadata)
                        .await
                        .map_err(execute_error)?;
                    self.remote
                        .push_document(account, id, &content, &digest)
                        .await
                        .map_err(execute_error)?
                }
                other => other.map_err(execute_error)?,
            };
            pushed.metadata.content_version = version;
            pushed.metadata.content_digest = Some(digest);
            pushed.document_edited = false;
            self.record_push(id, &file, pushed).await?;
        }

        Ok(())
    }

    /// Store what the server accepted for a push based on `read`.
    ///
    /// If the record changed while the push was in flight, only the new
    /// server versions are merged in. Its flags stay set, so the newer
    /// local state is pushed next round. Returns the record as stored.
    async fn record_push(
        &self,
        id: FileId,
        read: &LocalFile,
        pushed: LocalFile,
    ) -> Result<Option<LocalFile>, ExecuteWorkError> {
        if self
            .store
            .replace_if_unchanged(id, Some(read), Some(pushed.clone()), None)
            .await
            .map_err(unexpected)?
        {
            return Ok(Some(pushed));
        }

        debug!(file = %id, "edited during push, keeping local changes");
        loop {
            let Some(current) = self.store.get(id).await.map_err(unexpected)? else {
                return Ok(None);
            };
            let mut merged = current.clone();
            merged.metadata.metadata_version = merged
                .metadata
                .metadata_version
                .max(pushed.metadata.metadata_version);
            if pushed.metadata.content_version > merged.metadata.content_version {
                merged.metadata.content_version = pushed.metadata.content_version;
                merged.metadata.content_digest = pushed.metadata.content_digest.clone();
            }
            if self
                .store
                .replace_if_unchanged(id, Some(&current), Some(merged.clone()), None)
                .await
                .map_err(unexpected)?
            {
                return Ok(Some(merged));
            }
        }
    }

    async fn pull_remote(&self, account: &Account, id: FileId) -> Result<(), ExecuteWorkError> {
        let server = self
            .remote
            .get_metadata(account, id)
            .await
            .map_err(execute_error)?
            .ok_or(ExecuteWorkError::FileNotFound)?;
        let local = self.store.get(id).await.map_err(unexpected)?;

        if let Some(local) = &local {
            if local.has_local_changes() {
                // Edited since the batch was calculated; the next
                // calculation turns this into a push.
                debug!(file = %id, "skipping pull over unpushed local changes");
                return Ok(());
            }
        }

        let pulled = if server.deleted {
            if local.is_none() {
                return Ok(());
            }
            None
        } else {
            let mut file = LocalFile::pulled(server);
            file.generation = local.as_ref().map_or(0, |l| l.generation);
            Some(file)
        };

        let local_content_version = local.as_ref().map_or(0, |f| f.metadata.content_version);
        let content = match &pulled {
            Some(file)
                if file.metadata.is_document()
                    && file.metadata.content_version > local_content_version =>
            {
                let content = self
                    .remote
                    .get_document(account, id)
                    .await
                    .map_err(execute_error)?;
                if let Some(expected) = &file.metadata.content_digest {
                    let actual = content_digest(&content);
                    if &actual != expected {
                        return Err(ExecuteWorkError::ContentCorrupted {
                            expected: expected.clone(),
                            actual,
                        });
                    }
                }
                Some(content)
            }
            _ => None,
        };

        let applied = self
            .store
            .replace_if_unchanged(id, local.as_ref(), pulled, content.as_deref())
            .await
            .map_err(unexpected)?;
        if !applied {
            // The local edit turns into a push on the next calculation.
            debug!(file = %id, "edited during pull, keeping local changes");
        }
        Ok(())
    }
}

#[async_trait]
impl<S: LocalStore, R: Remote> AccountProvider for SyncService<S, R> {
    async fn get_account(&self) -> Result<Account, GetAccountError> {
        match self.store.account().await {
            Ok(Some(account)) => Ok(account),
            Ok(None) => Err(GetAccountError::NoAccount),
            Err(e) => Err(GetAccountError::Unexpected(e.to_string())),
        }
    }
}

#[async_trait]
impl<S: LocalStore, R: Remote> WorkCalculator for SyncService<S, R> {
    async fn calculate_work(&self) -> Result<SyncWorkBatch, CalculateWorkError> {
        let account = self.get_account().await?;
        let marker = self.store.last_synced().await.map_err(calculate_unexpected)?;
        let updates = self
            .remote
            .get_updates(&account, marker.watermark)
            .await
            .map_err(calculate_error)?;
        let mut local = self.store.all().await.map_err(calculate_unexpected)?;
        local.sort_by_key(|f| f.metadata.id);

        let watermark = updates
            .iter()
            .map(|f| Watermark::new(f.latest_version()))
            .max()
            .map_or(marker.watermark, |newest| newest.max(marker.watermark));

        let pending_push: HashSet<FileId> = local
            .iter()
            .filter(|f| f.has_local_changes())
            .map(|f| f.metadata.id)
            .collect();
        let known: HashMap<FileId, &FileMetadata> =
            local.iter().map(|f| (f.metadata.id, &f.metadata)).collect();

        let mut work_units = Vec::new();
        for server in &updates {
            if pending_push.contains(&server.id) {
                continue;
            }
            if let Some(kind) = pull_kind(server, known.get(&server.id).copied()) {
                work_units.push(WorkUnit::pull(server.id, &server.name, kind));
            }
        }
        for file in local.iter().filter(|f| f.has_local_changes()) {
            let kind = if file.document_edited && !file.metadata.deleted {
                WorkKind::Document
            } else {
                WorkKind::Metadata
            };
            work_units.push(WorkUnit::push(file.metadata.id, &file.metadata.name, kind));
        }

        debug!(
            units = work_units.len(),
            watermark = %watermark,
            "calculated work"
        );
        Ok(SyncWorkBatch::new(work_units, watermark))
    }
}

#[async_trait]
impl<S: LocalStore, R: Remote> WorkExecutor for SyncService<S, R> {
    async fn execute_work(
        &self,
        account: &Account,
        unit: &WorkUnit,
    ) -> Result<(), ExecuteWorkError> {
        match unit.direction {
            WorkDirection::PushLocal => self.push_local(account, unit.file_id).await,
            WorkDirection::PullRemote => self.pull_remote(account, unit.file_id).await,
        }
    }
}

#[async_trait]
impl<S: LocalStore, R: Remote> WatermarkStore for SyncService<S, R> {
    async fn last_synced(&self) -> Result<SyncMarker, StoreError> {
        self.store.last_synced().await
    }

    async fn set_last_synced(&self, watermark: Watermark) -> Result<(), StoreError> {
        self.store
            .set_last_synced(SyncMarker {
                watermark,
                synced_at: unix_now(),
            })
            .await
    }
}

/// What pulling `server` would move, or `None` if local is already current.
fn pull_kind(server: &FileMetadata, local: Option<&FileMetadata>) -> Option<WorkKind> {
    let (local_meta, local_content) =
        local.map_or((0, 0), |l| (l.metadata_version, l.content_version));
    if local.is_none() && server.deleted {
        return None;
    }
    let content_newer = server.is_document() && server.content_version > local_content;
    if content_newer && !server.deleted {
        Some(WorkKind::Document)
    } else if server.metadata_version > local_meta || content_newer {
        Some(WorkKind::Metadata)
    } else {
        None
    }
}

fn calculate_error(err: RemoteError) -> CalculateWorkError {
    match err {
        RemoteError::CouldNotReachServer(_) => CalculateWorkError::CouldNotReachServer,
        RemoteError::ClientUpdateRequired => CalculateWorkError::ClientUpdateRequired,
        other => CalculateWorkError::Unexpected(other.to_string()),
    }
}

fn calculate_unexpected(err: StoreError) -> CalculateWorkError {
    CalculateWorkError::Unexpected(err.to_string())
}

fn execute_error(err: RemoteError) -> ExecuteWorkError {
    match err {
        RemoteError::CouldNotReachServer(_) => ExecuteWorkError::CouldNotReachServer,
        RemoteError::ClientUpdateRequired => ExecuteWorkError::ClientUpdateRequired,
        RemoteError::NotFound(_) => ExecuteWorkError::FileNotFound,
        other => ExecuteWorkError::Unexpected(other.to_string()),
    }
}

fn unexpected(err: StoreError) -> ExecuteWorkError {
    ExecuteWorkError::Unexpected(err.to_string())
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}
