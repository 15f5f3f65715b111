//! # filesync
//!
//! Command-line client for filesync.
//!
//! ## Commands
//!
//! - `init`: Create the local account
//! - `add`, `mkdir`, `rm`: Make local changes
//! - `ls`, `cat`: Inspect local files
//! - `status`: Show account, last sync and pending changes
//! - `sync`: Push local changes and pull remote ones
//!
//! ## Example
//!
//! ```bash
//! # Two data dirs sharing one server directory
//! filesync --data-dir ./a init --username alice --server /mnt/share
//! filesync --data-dir ./b init --username alice --server /mnt/share
//!
//! filesync --data-dir ./a add notes.md
//! filesync --data-dir ./a sync
//! filesync --data-dir ./b sync
//! filesync --data-dir ./b cat notes.md
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::{files, init, status, sync};

/// Command-line client for filesync.
#[derive(Parser, Debug)]
#[command(name = "filesync")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Data directory holding the account, file records and content
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the local account
    Init {
        /// Account name on the server
        #[arg(long, short)]
        username: String,

        /// Server directory shared between clients
        #[arg(long, short)]
        server: PathBuf,
    },

    /// Add a local file as a new document
    Add {
        /// File to read
        file: PathBuf,

        /// Document name (defaults to the file name)
        #[arg(long, short)]
        name: Option<String>,
    },

    /// Create a folder
    Mkdir {
        /// Folder name
        name: String,
    },

    /// Delete a file or folder
    Rm {
        /// Name to delete
        name: String,
    },

    /// List local files
    Ls,

    /// Print a document
    Cat {
        /// Document name
        name: String,
    },

    /// Show sync status
    Status,

    /// Sync with the server
    Sync,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Determine data directory
    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };

    // Ensure data directory exists
    tokio::fs::create_dir_all(&data_dir)
        .await
        .context("Failed to create data directory")?;
    config::set_dir_permissions_0700(&data_dir).await?;
    tracing::debug!(data_dir = %data_dir.display(), "using data directory");

    match cli.command {
        Commands::Init { username, server } => {
            init::run(&data_dir, &username, &server).await?;
        }
        Commands::Add { file, name } => {
            files::add(&data_dir, &file, name.as_deref()).await?;
        }
        Commands::Mkdir { name } => {
            files::mkdir(&data_dir, &name).await?;
        }
        Commands::Rm { name } => {
            files::rm(&data_dir, &name).await?;
        }
        Commands::Ls => {
            files::ls(&data_dir).await?;
        }
        Commands::Cat { name } => {
            files::cat(&data_dir, &name).await?;
        }
        Commands::Status => {
            status::run(&data_dir).await?;
        }
        Commands::Sync => {
            sync::run(&data_dir).await?;
        }
    }

    Ok(())
}

/// Log to stderr, filtered by `RUST_LOG` or the verbosity flag.
fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Get the default data directory for filesync.
fn default_data_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("io", "filesync", "filesync")
        .context("Could not determine home directory")?;
    Ok(dirs.data_dir().to_path_buf())
}
