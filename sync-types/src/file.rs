//! File metadata shared by the local store and the remote server.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::ids::FileId;

/// Is this a file or a folder?
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileType {
    /// Carries content.
    Document,
    /// Metadata only.
    Folder,
}

/// Metadata for one file as last seen by either side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    /// Immutable unique identifier for everything related to this file.
    pub id: FileId,
    /// Human readable name. Does not need to be unique.
    pub name: String,
    /// Document or folder.
    pub file_type: FileType,
    /// Server version at which the metadata last changed (0 = never pushed).
    pub metadata_version: u64,
    /// Server version at which the content last changed (0 = never pushed).
    pub content_version: u64,
    /// Hex SHA-256 of the content at `content_version`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_digest: Option<String>,
    /// True once the file has been deleted.
    #[serde(default)]
    pub deleted: bool,
}

impl FileMetadata {
    /// Metadata for a file that has never reached the server.
    pub fn new(name: &str, file_type: FileType) -> Self {
        Self {
            id: FileId::new(),
            name: name.to_string(),
            file_type,
            metadata_version: 0,
            content_version: 0,
            content_digest: None,
            deleted: false,
        }
    }

    /// Check if this is a document.
    pub fn is_document(&self) -> bool {
        self.file_type == FileType::Document
    }

    /// The newest server version that touched this file.
    pub fn latest_version(&self) -> u64 {
        self.metadata_version.max(self.content_version)
    }
}

/// Hex-encoded SHA-256 of document content.
pub fn content_digest(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}
