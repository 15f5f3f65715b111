//! Error taxonomy for filesync.
//!
//! Lower layers classify their failures into these enums before anything
//! reaches the orchestrator, which only ever inspects the tags.

use serde::Serialize;
use thiserror::Error;

/// Errors from resolving the local account.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum GetAccountError {
    /// No account has been created or imported locally.
    #[error("no account")]
    NoAccount,

    /// Anything the store could not classify.
    #[error("unexpected: {0}")]
    Unexpected(String),
}

/// Errors from calculating outstanding work.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum CalculateWorkError {
    /// Local identity missing. Not retryable.
    #[error("no account")]
    NoAccount,

    /// Transient network failure. Retry later.
    #[error("could not reach server")]
    CouldNotReachServer,

    /// The server refuses this client version.
    #[error("client update required")]
    ClientUpdateRequired,

    /// Anything the rest of the system cannot classify.
    #[error("unexpected: {0}")]
    Unexpected(String),
}

impl From<GetAccountError> for CalculateWorkError {
    fn from(err: GetAccountError) -> Self {
        match err {
            GetAccountError::NoAccount => Self::NoAccount,
            GetAccountError::Unexpected(msg) => Self::Unexpected(msg),
        }
    }
}

/// Errors from executing one work unit. Always attached to a single file.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum ExecuteWorkError {
    /// Transient network failure while moving this file.
    #[error("could not reach server")]
    CouldNotReachServer,

    /// The server refuses this client version.
    #[error("client update required")]
    ClientUpdateRequired,

    /// The file vanished from the side it was supposed to be read from.
    #[error("file not found")]
    FileNotFound,

    /// Pulled content did not match the digest recorded in its metadata.
    #[error("content digest mismatch: expected {expected}, got {actual}")]
    ContentCorrupted {
        /// Digest recorded by the server.
        expected: String,
        /// Digest of the bytes actually received.
        actual: String,
    },

    /// Anything the rest of the system cannot classify.
    #[error("unexpected: {0}")]
    Unexpected(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(
            CalculateWorkError::CouldNotReachServer.to_string(),
            "could not reach server"
        );
        assert_eq!(
            ExecuteWorkError::Unexpected("disk full".into()).to_string(),
            "unexpected: disk full"
        );
    }

    #[test]
    fn account_error_maps_into_calculate_error() {
        assert_eq!(
            CalculateWorkError::from(GetAccountError::NoAccount),
            CalculateWorkError::NoAccount
        );
        assert_eq!(
            CalculateWorkError::from(GetAccountError::Unexpected("x".into())),
            CalculateWorkError::Unexpected("x".into())
        );
    }

    #[test]
    fn execute_error_serializes_for_logging() {
        let json = serde_json::to_string(&ExecuteWorkError::FileNotFound).unwrap();
        assert_eq!(json, "\"FileNotFound\"");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CalculateWorkError>();
        assert_send_sync::<ExecuteWorkError>();
    }
}
