//! Outstanding synchronization work.

use serde::{Deserialize, Serialize};

use crate::ids::{FileId, Watermark};

/// Which side originated the change a [`WorkUnit`] carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkDirection {
    /// A local edit that must be pushed to the server.
    PushLocal,
    /// A server change that must be pulled into the local store.
    PullRemote,
}

/// How much of the file a [`WorkUnit`] moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkKind {
    /// Name, deletion or other metadata only.
    Metadata,
    /// Metadata plus document content.
    Document,
}

/// One file's pending push or pull relative to a server state snapshot.
///
/// A unit is only meaningful against the snapshot it was computed from.
/// Executing other units may invalidate it, so callers recompute after
/// every batch instead of trusting a stale list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkUnit {
    /// The file or folder this unit concerns.
    pub file_id: FileId,
    /// Display name at the time the unit was computed.
    pub name: String,
    /// Push or pull.
    pub direction: WorkDirection,
    /// Metadata only, or metadata plus content.
    pub kind: WorkKind,
}

impl WorkUnit {
    /// A local change to push.
    pub fn push(file_id: FileId, name: &str, kind: WorkKind) -> Self {
        Self {
            file_id,
            name: name.to_string(),
            direction: WorkDirection::PushLocal,
            kind,
        }
    }

    /// A server change to pull.
    pub fn pull(file_id: FileId, name: &str, kind: WorkKind) -> Self {
        Self {
            file_id,
            name: name.to_string(),
            direction: WorkDirection::PullRemote,
            kind,
        }
    }

    /// Check if this unit pushes a local change.
    pub fn is_push(&self) -> bool {
        self.direction == WorkDirection::PushLocal
    }
}

/// The result of one work calculation.
///
/// Created fresh by each calculation, immutable once returned, and
/// superseded by the next calculation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SyncWorkBatch {
    /// Units in execution order.
    pub work_units: Vec<WorkUnit>,
    /// Newest server version observed while calculating.
    pub most_recent_update_from_server: Watermark,
}

impl SyncWorkBatch {
    /// Create a batch.
    pub fn new(work_units: Vec<WorkUnit>, most_recent_update_from_server: Watermark) -> Self {
        Self {
            work_units,
            most_recent_update_from_server,
        }
    }

    /// A batch with nothing to do.
    pub fn empty(most_recent_update_from_server: Watermark) -> Self {
        Self::new(Vec::new(), most_recent_update_from_server)
    }

    /// Check if there is no outstanding work.
    pub fn is_empty(&self) -> bool {
        self.work_units.is_empty()
    }

    /// Number of outstanding units.
    pub fn len(&self) -> usize {
        self.work_units.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_direction() {
        let id = FileId::new();
        assert!(WorkUnit::push(id, "a", WorkKind::Document).is_push());
        assert!(!WorkUnit::pull(id, "a", WorkKind::Metadata).is_push());
    }

    #[test]
    fn empty_batch_keeps_watermark() {
        let batch = SyncWorkBatch::empty(Watermark::new(9));
        assert!(batch.is_empty());
        assert_eq!(batch.len(), 0);
        assert_eq!(batch.most_recent_update_from_server, Watermark::new(9));
    }
}
