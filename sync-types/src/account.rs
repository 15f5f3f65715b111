//! The identity a sync runs on behalf of.

use serde::{Deserialize, Serialize};

/// A local account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Account name on the server.
    pub username: String,
    /// Where the server lives. Interpretation is up to the remote implementation.
    pub server_url: String,
}

impl Account {
    /// Create an account.
    pub fn new(username: &str, server_url: &str) -> Self {
        Self {
            username: username.to_string(),
            server_url: server_url.to_string(),
        }
    }
}
