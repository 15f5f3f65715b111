//! # sync-core
//!
//! Pure logic for filesync (no I/O, instant tests).
//!
//! This crate implements the state machine, progress accounting and round
//! decisions of the incremental sync workflow without any network or disk
//! I/O, enabling fast unit tests.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same input → same output)
//! - Easy reasoning about state transitions
//!
//! The actual I/O (network, disk) is performed by `sync-client`, which
//! calculates and executes work and asks this crate what to do next.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod errors;
pub mod policy;
pub mod progress;
pub mod round;
pub mod status;

pub use errors::SyncErrorMap;
pub use policy::{Backoff, RoundPolicy, DEFAULT_MAX_ROUNDS};
pub use progress::{ProgressTracker, SyncMessage, SyncStepInfo};
pub use round::{decide, RoundDecision};
pub use status::{SyncPhase, SyncStatus};
