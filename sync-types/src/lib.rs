//! # sync-types
//!
//! Data model for the filesync incremental file synchronization workflow.
//!
//! This crate provides the foundational types used across all filesync crates:
//! - [`FileId`], [`Watermark`] - Identity and ordering types
//! - [`FileMetadata`], [`FileType`] - What a file record looks like on both sides
//! - [`WorkUnit`], [`SyncWorkBatch`] - Outstanding synchronization work
//! - [`Account`] - The identity a sync runs on behalf of
//! - [`CalculateWorkError`], [`ExecuteWorkError`], [`GetAccountError`] - Error taxonomy

#![warn(missing_docs)]
#![warn(clippy::all)]

mod account;
mod error;
mod file;
mod ids;
mod work;

pub use account::Account;
pub use error::{CalculateWorkError, ExecuteWorkError, GetAccountError};
pub use file::{content_digest, FileMetadata, FileType};
pub use ids::{FileId, Watermark};
pub use work::{SyncWorkBatch, WorkDirection, WorkKind, WorkUnit};
