//! # sync-client
//!
//! Incremental, resumable file synchronization client for filesync.
//!
//! This is the library applications embed to keep a local file store in
//! step with a server.
//!
//! ## Features
//!
//! - **Round loop**: recalculate, execute, repeat until no work remains or
//!   the round budget runs out
//! - **Coalescing**: at most one sync per orchestrator; extra callers return
//!   immediately
//! - **Per-file failures**: one file failing never aborts a round
//! - **Progress stream**: a broadcast of monotonic progress snapshots
//! - **Pluggable I/O**: [`LocalStore`] and [`Remote`] traits with in-memory
//!   and on-disk implementations
//!
//! ## Example
//!
//! ```ignore
//! use filesync_client::{MemoryStore, MockRemote, SyncConfig, SyncOrchestrator, SyncService};
//!
//! let service = SyncService::new(MemoryStore::new(), MockRemote::new());
//! let orchestrator = SyncOrchestrator::new(service, &SyncConfig::default());
//!
//! let mut progress = orchestrator.subscribe();
//! let outcome = orchestrator.sync().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod config;
pub mod error;
mod fsutil;
pub mod orchestrator;
pub mod remote;
pub mod reporter;
pub mod service;
pub mod store;

pub use backend::{AccountProvider, SyncBackend, WatermarkStore, WorkCalculator, WorkExecutor};
pub use config::{BackoffConfig, ConfigError, ProgressConfig, RoundsConfig, SyncConfig};
pub use error::CoreError;
pub use orchestrator::{SyncOrchestrator, SyncOutcome};
pub use remote::{DirRemote, MockRemote, Remote, RemoteError, ServerIndex};
pub use reporter::ProgressReporter;
pub use service::SyncService;
pub use store::{
    create_document, create_folder, delete_file, edit_document, FileStore, LocalFile, LocalStore,
    MemoryStore, StoreError, SyncMarker,
};
