//! Per-file execution errors accumulated across rounds.

use std::collections::BTreeMap;

use filesync_types::{ExecuteWorkError, FileId};
use serde::Serialize;

/// Most recent execution error per file within one sync call.
///
/// An entry is overwritten by a later failure for the same file (last error
/// wins) and removed the moment that file's unit succeeds, so only the final
/// per-file state decides the outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SyncErrorMap {
    errors: BTreeMap<FileId, ExecuteWorkError>,
}

impl SyncErrorMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure for `file_id`, replacing any earlier one.
    pub fn record(&mut self, file_id: FileId, error: ExecuteWorkError) {
        self.errors.insert(file_id, error);
    }

    /// Forget any failure for `file_id`. Returns true if one was present.
    pub fn clear(&mut self, file_id: &FileId) -> bool {
        self.errors.remove(file_id).is_some()
    }

    /// The recorded failure for `file_id`, if any.
    pub fn get(&self, file_id: &FileId) -> Option<&ExecuteWorkError> {
        self.errors.get(file_id)
    }

    /// Check if `file_id` has a recorded failure.
    pub fn contains(&self, file_id: &FileId) -> bool {
        self.errors.contains_key(file_id)
    }

    /// Check if no failures are recorded.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of files with a recorded failure.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Iterate failures in file id order.
    pub fn iter(&self) -> impl Iterator<Item = (&FileId, &ExecuteWorkError)> {
        self.errors.iter()
    }

    /// JSON rendering for logs.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| format!("<unserializable: {}>", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_error_wins() {
        let mut map = SyncErrorMap::new();
        let id = FileId::new();
        map.record(id, ExecuteWorkError::CouldNotReachServer);
        map.record(id, ExecuteWorkError::FileNotFound);
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&id), Some(&ExecuteWorkError::FileNotFound));
    }

    #[test]
    fn clear_removes_entry() {
        let mut map = SyncErrorMap::new();
        let id = FileId::new();
        map.record(id, ExecuteWorkError::FileNotFound);
        assert!(map.clear(&id));
        assert!(!map.clear(&id));
        assert!(map.is_empty());
        assert!(!map.contains(&id));
    }

    #[test]
    fn json_is_keyed_by_file_id() {
        let mut map = SyncErrorMap::new();
        let id = FileId::new();
        map.record(id, ExecuteWorkError::Unexpected("boom".into()));
        let json = map.to_json();
        assert!(json.contains(&id.to_string()), "got: {}", json);
        assert!(json.contains("boom"));
    }
}
