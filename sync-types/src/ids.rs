//! Identity and ordering types for filesync.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A unique identifier for a file or folder.
///
/// UUID v4 format (16 bytes). Immutable for the lifetime of the file.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FileId(uuid::Uuid);

impl FileId {
    /// Create a new random FileId.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Create a FileId from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        uuid::Uuid::from_slice(bytes).ok().map(Self)
    }

    /// Parse a FileId from its hyphenated string form.
    pub fn parse(s: &str) -> Option<Self> {
        uuid::Uuid::parse_str(s).ok().map(Self)
    }

    /// Get the raw bytes of this FileId.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Get the inner UUID.
    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for FileId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileId({})", &self.0.to_string()[..8])
    }
}

/// An opaque server-issued version marking how far local state is known
/// to match the server.
///
/// Assigned by the server, never by clients. Versions are more reliable
/// than timestamps because device clocks can drift.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Watermark(u64);

impl Watermark {
    /// Create a new Watermark with the given value.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the numeric value of this Watermark.
    pub fn value(&self) -> u64 {
        self.0
    }

    /// A Watermark representing "never synced".
    pub fn zero() -> Self {
        Self(0)
    }

    /// True if nothing has ever been synced up to this mark.
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Watermark({})", self.0)
    }
}
