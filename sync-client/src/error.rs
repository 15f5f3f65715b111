//! Caller-facing errors.

use filesync_core::SyncErrorMap;
use filesync_types::{CalculateWorkError, GetAccountError};
use thiserror::Error;

/// Errors returned by [`SyncOrchestrator`](crate::SyncOrchestrator).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// No local account.
    #[error("no account")]
    NoAccount,

    /// The server could not be reached.
    ///
    /// Only [`has_sync_work`](crate::SyncOrchestrator::has_sync_work) returns
    /// this. A sync that goes offline stops quietly with
    /// [`SyncOutcome::Offline`](crate::SyncOutcome::Offline).
    #[error("could not reach server")]
    CouldNotReachServer,

    /// The server refuses this client version.
    #[error("client update required")]
    ClientUpdateRequired,

    /// A failure nothing could classify.
    #[error("unexpected error: {0}")]
    Unexpected(String),

    /// No work remained but per-file errors were still recorded.
    #[error("sync errors persist although no work remains ({} files)", .errors.len())]
    ErrorsWithoutWork {
        /// Failures outstanding when work ran out.
        errors: SyncErrorMap,
    },

    /// The round budget ran out with work or failures outstanding.
    #[error(
        "couldn't sync all files: {} failed, {remaining} units outstanding after {rounds} rounds",
        .errors.len()
    )]
    Incomplete {
        /// Rounds executed.
        rounds: u32,
        /// Units in the last calculated batch.
        remaining: usize,
        /// Failures outstanding at exit.
        errors: SyncErrorMap,
    },
}

impl CoreError {
    /// Check if retrying later may succeed without user action.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::CouldNotReachServer | Self::Incomplete { .. })
    }
}

impl From<CalculateWorkError> for CoreError {
    fn from(err: CalculateWorkError) -> Self {
        match err {
            CalculateWorkError::NoAccount => Self::NoAccount,
            CalculateWorkError::CouldNotReachServer => Self::CouldNotReachServer,
            CalculateWorkError::ClientUpdateRequired => Self::ClientUpdateRequired,
            CalculateWorkError::Unexpected(msg) => Self::Unexpected(msg),
        }
    }
}

impl From<GetAccountError> for CoreError {
    fn from(err: GetAccountError) -> Self {
        match err {
            GetAccountError::NoAccount => Self::NoAccount,
            GetAccountError::Unexpected(msg) => Self::Unexpected(msg),
        }
    }
}
