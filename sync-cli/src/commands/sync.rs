//! Sync with the server.

use anyhow::{Context, Result};
use filesync_client::{SyncOrchestrator, SyncOutcome};
use filesync_core::SyncStepInfo;
use std::path::Path;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use crate::config::{load_sync_config, open_service};

/// Run the sync command. Ctrl-C stops it between units.
pub async fn run(data_dir: &Path) -> Result<()> {
    let cancel = CancellationToken::new();
    let watcher = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        }
    });

    let result = sync_once(data_dir, &cancel).await;
    watcher.abort();
    let outcome = result?;
    println!("{}", summarize(&outcome));
    Ok(())
}

/// Sync, printing each progress step as it is published.
async fn sync_once(data_dir: &Path, cancel: &CancellationToken) -> Result<SyncOutcome> {
    let config = load_sync_config(data_dir)?;
    let orchestrator = SyncOrchestrator::new(open_service(data_dir).await?, &config);

    let mut rx = orchestrator.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(step) => println!("{}", format_step(&step)),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });

    let result = orchestrator.sync_with_cancel(cancel).await;
    // Closes the channel so the printer drains and exits.
    drop(orchestrator);
    printer.await.context("Progress printer failed")?;

    result.context("Sync failed")
}

fn format_step(step: &SyncStepInfo) -> String {
    format!("[{}/{}] {}", step.progress, step.total, step.action)
}

fn summarize(outcome: &SyncOutcome) -> String {
    match outcome {
        SyncOutcome::Completed { executed: 0, .. } => "Already up to date.".to_string(),
        SyncOutcome::Completed { executed, .. } => format!("Synced {} changes.", executed),
        SyncOutcome::AlreadySyncing => "A sync is already running.".to_string(),
        SyncOutcome::Offline { executed } => format!(
            "Server unreachable after {} changes; run sync again later.",
            executed
        ),
        SyncOutcome::Cancelled { executed } => format!("Cancelled after {} changes.", executed),
    }
}
