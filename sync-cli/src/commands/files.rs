//! Local file commands: add, mkdir, rm, ls, cat.
//!
//! These only touch the local store. Changes reach the server on the next
//! `filesync sync`.

use anyhow::{Context, Result};
use filesync_client::{
    create_document, create_folder, delete_file, edit_document, FileStore, LocalFile, LocalStore,
};
use filesync_types::FileType;
use std::io::Write;
use std::path::Path;

use crate::config::{open_store, require_account};

async fn open(data_dir: &Path) -> Result<FileStore> {
    let store = open_store(data_dir).await?;
    require_account(&store).await?;
    Ok(store)
}

/// Add a document, or replace its content if the name already exists.
pub async fn add(data_dir: &Path, file: &Path, name: Option<&str>) -> Result<()> {
    let store = open(data_dir).await?;
    let name = match name {
        Some(name) => name.to_string(),
        None => file
            .file_name()
            .context("File has no name; pass --name")?
            .to_string_lossy()
            .into_owned(),
    };
    let content = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    match store.find_by_name(&name).await? {
        Some(existing) if existing.metadata.is_document() => {
            edit_document(&store, existing.metadata.id, &content).await?;
            println!("Updated {} ({} bytes)", name, content.len());
        }
        Some(_) => anyhow::bail!("'{}' is a folder", name),
        None => {
            create_document(&store, &name, &content).await?;
            println!("Added {} ({} bytes)", name, content.len());
        }
    }
    Ok(())
}

/// Create a folder.
pub async fn mkdir(data_dir: &Path, name: &str) -> Result<()> {
    let store = open(data_dir).await?;
    if store.find_by_name(name).await?.is_some() {
        anyhow::bail!("'{}' already exists", name);
    }
    create_folder(&store, name).await?;
    println!("Created folder {}", name);
    Ok(())
}

/// Mark a file deleted.
pub async fn rm(data_dir: &Path, name: &str) -> Result<()> {
    let store = open(data_dir).await?;
    let file = store
        .find_by_name(name)
        .await?
        .with_context(|| format!("No such file: {}", name))?;
    delete_file(&store, file.metadata.id).await?;
    println!("Deleted {}", name);
    Ok(())
}

/// List local files.
pub async fn ls(data_dir: &Path) -> Result<()> {
    let store = open(data_dir).await?;
    let lines = listing(store.all().await?);
    if lines.is_empty() {
        println!("No files.");
    }
    for line in lines {
        println!("{}", line);
    }
    Ok(())
}

/// Print a document to stdout.
pub async fn cat(data_dir: &Path, name: &str) -> Result<()> {
    let store = open(data_dir).await?;
    let content = read_named(&store, name).await?;
    std::io::stdout()
        .write_all(&content)
        .context("Failed to write to stdout")?;
    Ok(())
}

async fn read_named(store: &FileStore, name: &str) -> Result<Vec<u8>> {
    let file = store
        .find_by_name(name)
        .await?
        .with_context(|| format!("No such file: {}", name))?;
    if !file.metadata.is_document() {
        anyhow::bail!("'{}' is a folder", name);
    }
    Ok(store
        .read_document(file.metadata.id)
        .await?
        .unwrap_or_default())
}

/// One line per live file, sorted by name. `*` marks unpushed changes.
fn listing(mut files: Vec<LocalFile>) -> Vec<String> {
    files.retain(|f| !f.metadata.deleted);
    files.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));
    files
        .iter()
        .map(|f| {
            let marker = if f.has_local_changes() { '*' } else { ' ' };
            let kind = match f.metadata.file_type {
                FileType::Folder => "dir",
                FileType::Document => "doc",
            };
            format!("{} {} {}", marker, kind, f.metadata.name)
        })
        .collect()
}
