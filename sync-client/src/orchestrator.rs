//! SyncOrchestrator - the round loop driving one incremental sync.
//!
//! # Architecture
//!
//! The orchestrator owns the transient sync status and asks `filesync-core`
//! what to do after every calculation; all I/O goes through a
//! [`SyncBackend`].
//!
//! ```text
//! sync() ─► get_account ─► calculate ─► decide ─┬─ Execute ─► execute each unit ─► calculate ─┐
//!                                       ▲       │                                             │
//!                                       │       ├─ Finished ─► set_last_synced ─► Completed   │
//!                                       │       └─ ErrorsWithoutWork / BudgetExhausted ─► Err │
//!                                       └─────────────────────────────────────────────────────┘
//! ```
//!
//! At most one sync runs per orchestrator. A caller arriving while one is
//! in flight gets [`SyncOutcome::AlreadySyncing`] without any backend call.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Mutex;

use filesync_core::{
    decide, ProgressTracker, RoundDecision, RoundPolicy, SyncErrorMap, SyncMessage, SyncPhase,
    SyncStatus, SyncStepInfo,
};
use filesync_types::{CalculateWorkError, SyncWorkBatch, Watermark};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::backend::SyncBackend;
use crate::config::SyncConfig;
use crate::error::CoreError;
use crate::reporter::ProgressReporter;
use crate::store::SyncMarker;

/// How a sync call ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// All work drained and the watermark was persisted.
    Completed {
        /// Watermark now recorded as last synced.
        watermark: Watermark,
        /// Units executed successfully.
        executed: usize,
    },
    /// Another sync was already in flight; nothing was done.
    AlreadySyncing,
    /// The server became unreachable. Work done so far stays committed.
    Offline {
        /// Units executed successfully before going offline.
        executed: usize,
    },
    /// The cancellation token fired. The watermark was not touched.
    Cancelled {
        /// Units executed successfully before cancellation.
        executed: usize,
    },
}

/// Drives incremental sync rounds against a [`SyncBackend`].
pub struct SyncOrchestrator<B> {
    backend: B,
    policy: RoundPolicy,
    phase: AtomicU8,
    latest: Mutex<Option<SyncStepInfo>>,
    reporter: ProgressReporter,
}

impl<B: SyncBackend> SyncOrchestrator<B> {
    /// Create an orchestrator.
    pub fn new(backend: B, config: &SyncConfig) -> Self {
        Self {
            backend,
            policy: config.round_policy(),
            phase: AtomicU8::new(SyncPhase::NotSyncing as u8),
            latest: Mutex::new(None),
            reporter: ProgressReporter::new(config.progress.channel_capacity),
        }
    }

    /// Replace the round policy.
    pub fn with_policy(mut self, policy: RoundPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The round policy in effect.
    pub fn policy(&self) -> &RoundPolicy {
        &self.policy
    }

    /// Subscribe to progress snapshots published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncStepInfo> {
        self.reporter.subscribe()
    }

    /// Current sync status.
    pub fn status(&self) -> SyncStatus {
        match SyncPhase::from_u8(self.phase.load(Ordering::Acquire)) {
            Some(SyncPhase::StartingSync) => SyncStatus::StartingSync,
            Some(SyncPhase::Syncing) => {
                let step = lock(&self.latest).clone();
                SyncStatus::Syncing(step.unwrap_or_else(|| {
                    ProgressTracker::new().snapshot(SyncMessage::PullingMetadata)
                }))
            }
            Some(SyncPhase::NotSyncing) | None => SyncStatus::NotSyncing,
        }
    }

    /// Check if a calculation would return any work.
    ///
    /// Unlike [`sync`](Self::sync), an unreachable server is an error here.
    pub async fn has_sync_work(&self) -> Result<bool, CoreError> {
        match self.backend.calculate_work().await {
            Ok(batch) => Ok(!batch.is_empty()),
            Err(e) => Err(e.into()),
        }
    }

    /// The marker recorded by the last successful sync.
    pub async fn last_synced(&self) -> Result<SyncMarker, CoreError> {
        self.backend
            .last_synced()
            .await
            .map_err(|e| CoreError::Unexpected(e.to_string()))
    }

    /// Run one sync to completion.
    pub async fn sync(&self) -> Result<SyncOutcome, CoreError> {
        self.sync_with_cancel(&CancellationToken::new()).await
    }

    /// Run one sync, checking `cancel` between rounds and before each unit.
    pub async fn sync_with_cancel(
        &self,
        cancel: &CancellationToken,
    ) -> Result<SyncOutcome, CoreError> {
        if self
            .phase
            .compare_exchange(
                SyncPhase::NotSyncing as u8,
                SyncPhase::StartingSync as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            debug!("sync already in progress");
            return Ok(SyncOutcome::AlreadySyncing);
        }
        let _active = ActiveSync {
            phase: &self.phase,
            latest: &self.latest,
        };

        let result = self.run(cancel).await;
        match &result {
            Ok(outcome) => info!(?outcome, "sync finished"),
            Err(e) => error!(error = %e, "sync failed"),
        }
        result
    }

    async fn run(&self, cancel: &CancellationToken) -> Result<SyncOutcome, CoreError> {
        let account = self.backend.get_account().await?;
        info!(user = %account.username, "starting sync");

        let mut batch = match self.calculate().await? {
            Some(batch) => batch,
            None => return Ok(SyncOutcome::Offline { executed: 0 }),
        };

        let mut tracker = ProgressTracker::new();
        advance(&self.phase, SyncPhase::Syncing);
        self.publish(tracker.begin(batch.len()));

        let mut errors = SyncErrorMap::new();
        let mut rounds = 0u32;
        let mut executed = 0usize;

        loop {
            if let Some(step) = tracker.observe_remaining(batch.len()) {
                self.publish(step);
            }

            match decide(batch.len(), &errors, rounds, &self.policy) {
                RoundDecision::Execute => {}
                RoundDecision::Finished => {
                    let watermark = batch.most_recent_update_from_server;
                    self.backend
                        .set_last_synced(watermark)
                        .await
                        .map_err(|e| CoreError::Unexpected(e.to_string()))?;
                    return Ok(SyncOutcome::Completed {
                        watermark,
                        executed,
                    });
                }
                RoundDecision::ErrorsWithoutWork => {
                    error!(errors = %errors.to_json(), "no work left but errors remain");
                    return Err(CoreError::ErrorsWithoutWork { errors });
                }
                RoundDecision::BudgetExhausted => {
                    error!(
                        rounds,
                        remaining = batch.len(),
                        errors = %errors.to_json(),
                        "round budget exhausted"
                    );
                    return Err(CoreError::Incomplete {
                        rounds,
                        remaining: batch.len(),
                        errors,
                    });
                }
            }

            if cancel.is_cancelled() {
                return Ok(SyncOutcome::Cancelled { executed });
            }
            rounds += 1;
            debug!(round = rounds, units = batch.len(), "executing round");

            let mut round_failed = false;
            for unit in &batch.work_units {
                if cancel.is_cancelled() {
                    return Ok(SyncOutcome::Cancelled { executed });
                }
                self.publish(tracker.snapshot(SyncMessage::for_unit(unit)));

                match self.backend.execute_work(&account, unit).await {
                    Ok(()) => {
                        debug!(file = %unit.file_id, direction = ?unit.direction, "unit done");
                        tracker.unit_completed();
                        errors.clear(&unit.file_id);
                        executed += 1;
                    }
                    Err(e) => {
                        warn!(file = %unit.file_id, name = %unit.name, error = %e, "unit failed");
                        errors.record(unit.file_id, e);
                        round_failed = true;
                    }
                }
            }

            if round_failed {
                if let Some(delay) = self.policy.delay_after(rounds) {
                    debug!(?delay, "backing off before next round");
                    tokio::select! {
                        _ = cancel.cancelled() => return Ok(SyncOutcome::Cancelled { executed }),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }

            batch = match self.calculate().await? {
                Some(batch) => batch,
                None => return Ok(SyncOutcome::Offline { executed }),
            };
        }
    }

    /// Calculate work. `None` means the server could not be reached.
    async fn calculate(&self) -> Result<Option<SyncWorkBatch>, CoreError> {
        match self.backend.calculate_work().await {
            Ok(batch) => Ok(Some(batch)),
            Err(CalculateWorkError::CouldNotReachServer) => {
                warn!("server unreachable, stopping sync");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn publish(&self, step: SyncStepInfo) {
        *lock(&self.latest) = Some(step.clone());
        self.reporter.publish(step);
    }
}

impl<B> std::fmt::Debug for SyncOrchestrator<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncOrchestrator")
            .field("policy", &self.policy)
            .field("phase", &SyncPhase::from_u8(self.phase.load(Ordering::Acquire)))
            .finish_non_exhaustive()
    }
}

/// Returns the orchestrator to `NotSyncing` however the sync ends,
/// including when its future is dropped.
struct ActiveSync<'a> {
    phase: &'a AtomicU8,
    latest: &'a Mutex<Option<SyncStepInfo>>,
}

impl Drop for ActiveSync<'_> {
    fn drop(&mut self) {
        *lock(self.latest) = None;
        advance(self.phase, SyncPhase::NotSyncing);
    }
}

/// Move to `next`, checking it is a legal transition from the current phase.
fn advance(phase: &AtomicU8, next: SyncPhase) {
    let prev = SyncPhase::from_u8(phase.swap(next as u8, Ordering::AcqRel));
    debug_assert!(
        prev.is_some_and(|p| p.can_transition_to(next)),
        "illegal sync phase transition {:?} -> {:?}",
        prev,
        next
    );
}

fn lock(latest: &Mutex<Option<SyncStepInfo>>) -> std::sync::MutexGuard<'_, Option<SyncStepInfo>> {
    latest.lock().unwrap_or_else(|e| e.into_inner())
}
