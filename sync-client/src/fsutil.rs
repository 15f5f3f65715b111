//! Filesystem helpers shared by the on-disk store and the directory remote.
//!
//! Both are read-modify-write over files that other processes may touch at
//! the same time (two CLI invocations on one data dir, two clients on one
//! server directory). [`FileLock`] serializes them across processes and
//! [`temp_path_for`] keeps concurrent writers off each other's temp files.

use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// An exclusive advisory lock on a lock file. Released on drop.
#[derive(Debug)]
pub(crate) struct FileLock {
    _file: File,
}

impl FileLock {
    /// Wait until the lock on `path` is held, creating the file if needed.
    pub(crate) async fn acquire(path: &Path) -> io::Result<Self> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || {
            let file = OpenOptions::new()
                .create(true)
                .truncate(false)
                .read(true)
                .write(true)
                .open(&path)?;
            FileExt::lock_exclusive(&file)?;
            Ok(Self { _file: file })
        })
        .await
        .map_err(io::Error::other)?
    }
}

/// A temp file name next to `path`, unique to this write.
pub(crate) fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map_or_else(String::new, |n| n.to_string_lossy().into_owned());
    path.with_file_name(format!(".{}.{}.tmp", name, Uuid::new_v4().simple()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn temp_paths_are_unique_siblings() {
        let path = Path::new("/srv/alice/index.msgpack");
        let a = temp_path_for(path);
        let b = temp_path_for(path);
        assert_ne!(a, b);
        assert_eq!(a.parent(), path.parent());
        assert!(a.to_string_lossy().ends_with(".tmp"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn lock_is_exclusive_across_handles() {
        let dir = tempdir().unwrap();
        let path = Arc::new(dir.path().join("index.lock"));
        let inside = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let (path, inside) = (path.clone(), inside.clone());
            tasks.push(tokio::spawn(async move {
                let _lock = FileLock::acquire(&path).await.unwrap();
                assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
    }
}
