//! CLI command implementations.

pub mod files;
pub mod init;
pub mod status;
pub mod sync;
