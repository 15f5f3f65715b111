//! Progress accounting for a single sync call.
//!
//! The tracker keeps two counters:
//! - `progress`: units completed successfully so far
//! - `total`: a high-water mark of `progress + remaining work`
//!
//! Both only ever grow. Recalculated work can shrink, but the advertised
//! total never does, so a progress bar never appears to overflow past 100%
//! nor jump backwards. The ratio `progress / total` is not monotonic.

use std::fmt;

use filesync_types::{WorkKind, WorkUnit};
use serde::Serialize;

/// What the sync is doing right now, with enough detail for a status line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SyncMessage {
    /// Calculating work or moving metadata from the server.
    PullingMetadata,
    /// Moving metadata to the server.
    PushingMetadata,
    /// Downloading a document.
    PullingDocument(String),
    /// Uploading a document.
    PushingDocument(String),
}

impl SyncMessage {
    /// The message describing execution of `unit`.
    pub fn for_unit(unit: &WorkUnit) -> Self {
        match (unit.is_push(), unit.kind) {
            (true, WorkKind::Document) => Self::PushingDocument(unit.name.clone()),
            (true, WorkKind::Metadata) => Self::PushingMetadata,
            (false, WorkKind::Document) => Self::PullingDocument(unit.name.clone()),
            (false, WorkKind::Metadata) => Self::PullingMetadata,
        }
    }
}

impl fmt::Display for SyncMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PullingDocument(name) => write!(f, "Pulling {}.", name),
            Self::PushingDocument(name) => write!(f, "Pushing {}.", name),
            Self::PullingMetadata => write!(f, "Pulling files."),
            Self::PushingMetadata => write!(f, "Pushing files."),
        }
    }
}

/// A progress snapshot pushed to observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncStepInfo {
    /// Units completed so far.
    pub progress: usize,
    /// High-water mark of work seen during this sync.
    pub total: usize,
    /// Current action.
    pub action: SyncMessage,
}

/// Monotonic progress counters for one sync call.
#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    progress: usize,
    total: usize,
}

impl ProgressTracker {
    /// Create a tracker with nothing done and nothing advertised.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the size of the first batch. Returns the initial snapshot.
    pub fn begin(&mut self, initial_total: usize) -> SyncStepInfo {
        self.total = self.total.max(initial_total);
        self.snapshot(SyncMessage::PullingMetadata)
    }

    /// Account for a freshly recalculated batch of `remaining` units.
    ///
    /// Returns a snapshot to publish only if the total had to be raised.
    pub fn observe_remaining(&mut self, remaining: usize) -> Option<SyncStepInfo> {
        let needed = self.progress.saturating_add(remaining);
        if needed > self.total {
            self.total = needed;
            Some(self.snapshot(SyncMessage::PullingMetadata))
        } else {
            None
        }
    }

    /// Record one unit completed successfully.
    pub fn unit_completed(&mut self) {
        self.progress = self.progress.saturating_add(1);
        if self.progress > self.total {
            self.total = self.progress;
        }
    }

    /// Snapshot the counters with the given action.
    pub fn snapshot(&self, action: SyncMessage) -> SyncStepInfo {
        SyncStepInfo {
            progress: self.progress,
            total: self.total,
            action,
        }
    }

    /// Units completed so far.
    pub fn progress(&self) -> usize {
        self.progress
    }

    /// Current high-water total.
    pub fn total(&self) -> usize {
        self.total
    }
}
