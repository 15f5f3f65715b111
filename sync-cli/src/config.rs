//! Data directory and configuration handling for filesync.

use anyhow::{Context, Result};
use filesync_client::{DirRemote, FileStore, LocalStore, SyncConfig, SyncService};
use filesync_types::Account;
use std::path::Path;

/// Optional TOML configuration inside the data directory.
pub const CONFIG_FILE: &str = "filesync.toml";

/// The service used by every command that talks to the server.
pub type Service = SyncService<FileStore, DirRemote>;

/// Load `filesync.toml` from the data directory, or defaults if absent.
pub fn load_sync_config(data_dir: &Path) -> Result<SyncConfig> {
    SyncConfig::from_file_or_default(&data_dir.join(CONFIG_FILE))
        .context("Invalid filesync configuration")
}

/// Open the local store in the data directory.
pub async fn open_store(data_dir: &Path) -> Result<FileStore> {
    FileStore::open(data_dir)
        .await
        .context("Failed to open local store")
}

/// The local account, or an error telling the user to run `init`.
pub async fn require_account(store: &FileStore) -> Result<Account> {
    store
        .account()
        .await
        .context("Failed to read account")?
        .context("Not initialized. Run 'filesync init' first.")
}

/// Open the store and the account's server directory.
pub async fn open_service(data_dir: &Path) -> Result<Service> {
    let store = open_store(data_dir).await?;
    let account = require_account(&store).await?;
    let remote = DirRemote::new(Path::new(&account.server_url));
    Ok(SyncService::new(store, remote))
}

/// Set directory permissions to 0700 (owner only) on Unix.
/// No-op on non-Unix platforms.
pub async fn set_dir_permissions_0700(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
            .await
            .context("Failed to set directory permissions")?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_config_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = load_sync_config(dir.path()).unwrap();
        assert_eq!(config, SyncConfig::default());
    }

    #[test]
    fn config_file_is_read() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "[rounds]\nmax_rounds = 2\n").unwrap();
        let config = load_sync_config(dir.path()).unwrap();
        assert_eq!(config.rounds.max_rounds, 2);
    }

    #[test]
    fn broken_config_is_an_error() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "rounds = 3\n").unwrap();
        assert!(load_sync_config(dir.path()).is_err());
    }

    #[tokio::test]
    async fn service_requires_account() {
        let dir = tempdir().unwrap();
        let err = open_service(dir.path()).await.unwrap_err();
        assert!(err.to_string().contains("filesync init"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn data_dir_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempdir().unwrap();
        let data_dir = dir.path().join("test-data");
        tokio::fs::create_dir_all(&data_dir).await.unwrap();
        set_dir_permissions_0700(&data_dir).await.unwrap();

        let perms = tokio::fs::metadata(&data_dir).await.unwrap().permissions();
        assert_eq!(perms.mode() & 0o777, 0o700, "dir should be 0700");
    }
}
