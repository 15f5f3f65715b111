//! Create the local account.

use anyhow::{Context, Result};
use filesync_client::LocalStore;
use filesync_types::Account;
use std::path::Path;

use crate::config::{open_store, CONFIG_FILE};

/// Run the init command.
pub async fn run(data_dir: &Path, username: &str, server: &Path) -> Result<()> {
    let store = open_store(data_dir).await?;

    // Check if already initialized
    if let Some(existing) = store.account().await.context("Failed to read account")? {
        anyhow::bail!(
            "Already initialized as '{}'. Delete {} to reinitialize.",
            existing.username,
            data_dir.display()
        );
    }

    let server = if server.is_absolute() {
        server.to_path_buf()
    } else {
        std::env::current_dir()
            .context("Failed to resolve server directory")?
            .join(server)
    };
    tokio::fs::create_dir_all(&server)
        .await
        .with_context(|| format!("Failed to create server directory {}", server.display()))?;

    let account = Account::new(username, &server.to_string_lossy());
    store
        .set_account(&account)
        .await
        .context("Failed to save account")?;

    println!("Account created!");
    println!();
    println!("  Username: {}", account.username);
    println!("  Server:   {}", account.server_url);
    println!("  Data dir: {}", data_dir.display());
    println!();
    println!("Next steps:");
    println!("  1. Add a file: filesync add <file>");
    println!("  2. Sync:       filesync sync");
    println!("  Tune rounds and backoff in {}", data_dir.join(CONFIG_FILE).display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn init_creates_account() {
        let dir = tempdir().unwrap();
        let server = dir.path().join("server");
        run(dir.path(), "alice", &server).await.unwrap();

        let store = open_store(dir.path()).await.unwrap();
        let account = store.account().await.unwrap().unwrap();
        assert_eq!(account.username, "alice");
        assert_eq!(account.server_url, server.to_string_lossy());
        assert!(server.is_dir());
    }

    #[tokio::test]
    async fn init_fails_if_already_initialized() {
        let dir = tempdir().unwrap();
        let server = dir.path().join("server");

        // First init should succeed
        run(dir.path(), "alice", &server).await.unwrap();

        // Second init should fail
        let result = run(dir.path(), "bob", &server).await;
        assert!(result.is_err());
    }
}
