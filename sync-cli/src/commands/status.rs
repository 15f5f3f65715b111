//! Show sync status.

use anyhow::Result;
use filesync_client::{CoreError, LocalStore, SyncOrchestrator};
use std::path::Path;

use crate::config::{load_sync_config, open_service, open_store};

/// Run the status command.
pub async fn run(data_dir: &Path) -> Result<()> {
    println!("=== filesync status ===");
    println!();

    let store = open_store(data_dir).await?;
    let account = match store.account().await? {
        Some(account) => account,
        None => {
            println!("Account: NOT INITIALIZED");
            println!();
            println!("Run 'filesync init --username <name> --server <dir>' to initialize.");
            return Ok(());
        }
    };
    println!("Account:");
    println!("  Username: {}", account.username);
    println!("  Server:   {}", account.server_url);
    println!();

    let marker = store.last_synced().await?;
    println!("Last synced: {}", format_last_synced(marker.synced_at));

    let changes = store.local_changes().await?;
    println!("Local changes: {}", changes.len());
    for id in changes {
        if let Some(file) = store.get(id).await? {
            let what = if file.metadata.deleted {
                "deleted"
            } else if file.metadata.metadata_version == 0 {
                "new"
            } else {
                "modified"
            };
            println!("  {:<8} {}", what, file.metadata.name);
        }
    }

    let config = load_sync_config(data_dir)?;
    let orchestrator = SyncOrchestrator::new(open_service(data_dir).await?, &config);
    let work = match orchestrator.has_sync_work().await {
        Ok(true) => "yes".to_string(),
        Ok(false) => "no".to_string(),
        Err(CoreError::CouldNotReachServer) => "unknown (OFFLINE)".to_string(),
        Err(e) => format!("unknown ({})", e),
    };
    println!("Sync work pending: {}", work);

    Ok(())
}

/// Describe the last sync time, or "never" for a zero timestamp.
fn format_last_synced(ts: u64) -> String {
    if ts == 0 {
        "never".to_string()
    } else {
        format_timestamp(ts)
    }
}

/// Format a Unix timestamp as a human-readable string.
fn format_timestamp(ts: u64) -> String {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| d.as_secs());

    let diff = now.saturating_sub(ts);

    if diff < 60 {
        "just now".to_string()
    } else if diff < 3600 {
        format!("{} minutes ago", diff / 60)
    } else if diff < 86400 {
        format!("{} hours ago", diff / 3600)
    } else {
        format!("{} days ago", diff / 86400)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::init;
    use tempfile::tempdir;

    #[tokio::test]
    async fn status_without_init() {
        let dir = tempdir().unwrap();

        // Should succeed but show "not initialized"
        let result = run(dir.path()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn status_with_account() {
        let dir = tempdir().unwrap();
        init::run(dir.path(), "alice", &dir.path().join("server"))
            .await
            .unwrap();

        let result = run(dir.path()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn status_tolerates_unreachable_server() {
        let dir = tempdir().unwrap();
        let server = dir.path().join("server");
        init::run(dir.path(), "alice", &server).await.unwrap();
        std::fs::remove_dir(&server).unwrap();

        assert!(run(dir.path()).await.is_ok());
    }

    #[test]
    fn format_timestamp_works() {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs();

        assert_eq!(format_last_synced(0), "never");
        assert_eq!(format_timestamp(now), "just now");
        assert!(format_timestamp(now - 120).contains("minutes"));
        assert!(format_timestamp(now - 7200).contains("hours"));
        assert!(format_timestamp(now - 172800).contains("days"));
    }
}
