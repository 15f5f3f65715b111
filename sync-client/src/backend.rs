//! Collaborator contracts the orchestrator drives.
//!
//! Each trait converts its failures into the typed taxonomy from
//! `filesync-types` before returning, so the orchestrator only ever looks
//! at tags. [`SyncBackend`] bundles all four for a single generic bound.

use async_trait::async_trait;
use filesync_types::{
    Account, CalculateWorkError, ExecuteWorkError, GetAccountError, SyncWorkBatch, Watermark,
    WorkUnit,
};

use crate::store::{StoreError, SyncMarker};

/// Resolves the account a sync runs on behalf of.
#[async_trait]
pub trait AccountProvider: Send + Sync {
    /// The current local account.
    async fn get_account(&self) -> Result<Account, GetAccountError>;
}

/// Computes outstanding work against the local store and the server.
///
/// Read-only. Given the same local and remote state it returns the same set
/// of units, in an order that is stable within the returned batch.
#[async_trait]
pub trait WorkCalculator: Send + Sync {
    /// Calculate the current batch. May block on network I/O.
    async fn calculate_work(&self) -> Result<SyncWorkBatch, CalculateWorkError>;
}

/// Executes one unit of work.
///
/// Re-running a unit that failed partway, or that already succeeded, must
/// converge rather than corrupt state.
#[async_trait]
pub trait WorkExecutor: Send + Sync {
    /// Push or pull one file. May block on network I/O.
    async fn execute_work(&self, account: &Account, unit: &WorkUnit)
        -> Result<(), ExecuteWorkError>;
}

/// Persists the watermark of the last successful sync.
#[async_trait]
pub trait WatermarkStore: Send + Sync {
    /// The marker recorded by the last successful sync.
    async fn last_synced(&self) -> Result<SyncMarker, StoreError>;

    /// Record that local state matches the server up to `watermark`.
    async fn set_last_synced(&self, watermark: Watermark) -> Result<(), StoreError>;
}

/// Everything [`SyncOrchestrator`](crate::SyncOrchestrator) needs.
pub trait SyncBackend: AccountProvider + WorkCalculator + WorkExecutor + WatermarkStore {}

impl<T> SyncBackend for T where T: AccountProvider + WorkCalculator + WorkExecutor + WatermarkStore {}
