//! Download locks for segment targets.
//!
//! A lock marks an output file as "download in progress". It is taken before the
//! first byte is written and released only after the last segment was appended,
//! so a lock that survives a run means the output is incomplete.

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};

/// Storage for download locks, keyed by output path
#[async_trait]
pub trait LockStore: Send + Sync {
    async fn is_locked(&self, output: &Path) -> io::Result<bool>;

    async fn lock(&self, output: &Path) -> io::Result<()>;

    async fn unlock(&self, output: &Path) -> io::Result<()>;
}

/// Locks kept as zero-byte `.<filename>~` files next to the output
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkerFiles;

impl MarkerFiles {
    pub fn marker_path(output: &Path) -> PathBuf {
        let name = output
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        output.with_file_name(format!(".{}~", name))
    }
}

#[async_trait]
impl LockStore for MarkerFiles {
    async fn is_locked(&self, output: &Path) -> io::Result<bool> {
        tokio::fs::try_exists(Self::marker_path(output)).await
    }

    async fn lock(&self, output: &Path) -> io::Result<()> {
        tokio::fs::write(Self::marker_path(output), b"").await
    }

    async fn unlock(&self, output: &Path) -> io::Result<()> {
        match tokio::fs::remove_file(Self::marker_path(output)).await {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

/// A held lock. Dropping it without [`DownloadLock::release`] keeps the
/// lock in the store, which is how failed downloads stay marked.
#[must_use = "an unreleased lock marks the download as incomplete"]
pub struct DownloadLock<'a> {
    store: &'a dyn LockStore,
    output: PathBuf,
}

impl<'a> DownloadLock<'a> {
    pub async fn acquire(store: &'a dyn LockStore, output: &Path) -> io::Result<DownloadLock<'a>> {
        store.lock(output).await?;
        Ok(Self {
            store,
            output: output.to_path_buf(),
        })
    }

    pub async fn release(self) -> io::Result<()> {
        self.store.unlock(&self.output).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_path_is_hidden_sibling() {
        assert_eq!(
            MarkerFiles::marker_path(Path::new("source/vimeo/Audio.m4a")),
            PathBuf::from("source/vimeo/.Audio.m4a~")
        );
    }

    #[tokio::test]
    async fn test_marker_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("Video.m4v");
        let store = MarkerFiles;

        assert!(!store.is_locked(&output).await.unwrap());

        let lock = DownloadLock::acquire(&store, &output).await.unwrap();
        assert!(store.is_locked(&output).await.unwrap());
        assert_eq!(std::fs::metadata(dir.path().join(".Video.m4v~")).unwrap().len(), 0);

        lock.release().await.unwrap();
        assert!(!store.is_locked(&output).await.unwrap());
    }

    #[tokio::test]
    async fn test_dropped_lock_stays_held() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("Audio.m4a");
        let store = MarkerFiles;

        {
            let _lock = DownloadLock::acquire(&store, &output).await.unwrap();
        }
        assert!(store.is_locked(&output).await.unwrap());
    }

    #[tokio::test]
    async fn test_unlock_without_marker_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        assert!(MarkerFiles.unlock(&dir.path().join("missing")).await.is_ok());
    }
}
