//! Sync status state machine.
//!
//! ```text
//! NotSyncing ──sync()──► StartingSync ──first batch──► Syncing ──┐
//!     ▲                       │                          │  ▲    │ next round
//!     └───────────────────────┴──────── terminal ────────┘  └────┘
//! ```
//!
//! [`SyncStatus`] is what observers see. [`SyncPhase`] is its bare
//! discriminant, small enough to live in an atomic so concurrent callers
//! can claim the `NotSyncing → StartingSync` edge with one compare-and-swap.

use crate::progress::SyncStepInfo;

/// Process-local, transient sync status. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SyncStatus {
    /// Idle.
    #[default]
    NotSyncing,
    /// Claimed by a caller, waiting for the first work calculation.
    StartingSync,
    /// Executing rounds. Carries the latest published step.
    Syncing(SyncStepInfo),
}

impl SyncStatus {
    /// The discriminant of this status.
    pub fn phase(&self) -> SyncPhase {
        match self {
            Self::NotSyncing => SyncPhase::NotSyncing,
            Self::StartingSync => SyncPhase::StartingSync,
            Self::Syncing(_) => SyncPhase::Syncing,
        }
    }

    /// Check if a sync is in flight.
    pub fn is_active(&self) -> bool {
        self.phase().is_active()
    }
}

/// Discriminant of [`SyncStatus`], encodable as a `u8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SyncPhase {
    /// Idle.
    NotSyncing = 0,
    /// Claimed, first calculation pending.
    StartingSync = 1,
    /// Executing rounds.
    Syncing = 2,
}

impl SyncPhase {
    /// Decode from the `u8` produced by `as u8`.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::NotSyncing),
            1 => Some(Self::StartingSync),
            2 => Some(Self::Syncing),
            _ => None,
        }
    }

    /// Check if a sync is in flight.
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::NotSyncing)
    }

    /// Check if moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(&self, next: SyncPhase) -> bool {
        matches!(
            (self, next),
            (Self::NotSyncing, Self::StartingSync)
                | (Self::StartingSync, Self::Syncing)
                | (Self::StartingSync, Self::NotSyncing)
                | (Self::Syncing, Self::Syncing)
                | (Self::Syncing, Self::NotSyncing)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::SyncMessage;

    #[test]
    fn starts_not_syncing() {
        let status = SyncStatus::default();
        assert_eq!(status, SyncStatus::NotSyncing);
        assert!(!status.is_active());
    }

    #[test]
    fn syncing_is_active() {
        let status = SyncStatus::Syncing(SyncStepInfo {
            progress: 0,
            total: 1,
            action: SyncMessage::PullingMetadata,
        });
        assert_eq!(status.phase(), SyncPhase::Syncing);
        assert!(status.is_active());
        assert!(SyncStatus::StartingSync.is_active());
    }

    #[test]
    fn phase_roundtrips_through_u8() {
        for phase in [
            SyncPhase::NotSyncing,
            SyncPhase::StartingSync,
            SyncPhase::Syncing,
        ] {
            assert_eq!(SyncPhase::from_u8(phase as u8), Some(phase));
        }
        assert_eq!(SyncPhase::from_u8(3), None);
    }

    #[test]
    fn only_idle_can_start() {
        assert!(SyncPhase::NotSyncing.can_transition_to(SyncPhase::StartingSync));
        assert!(!SyncPhase::StartingSync.can_transition_to(SyncPhase::StartingSync));
        assert!(!SyncPhase::Syncing.can_transition_to(SyncPhase::StartingSync));
    }

    #[test]
    fn idle_cannot_jump_to_syncing() {
        assert!(!SyncPhase::NotSyncing.can_transition_to(SyncPhase::Syncing));
    }

    #[test]
    fn every_active_phase_can_terminate() {
        assert!(SyncPhase::StartingSync.can_transition_to(SyncPhase::NotSyncing));
        assert!(SyncPhase::Syncing.can_transition_to(SyncPhase::NotSyncing));
        assert!(SyncPhase::Syncing.can_transition_to(SyncPhase::Syncing));
    }
}
