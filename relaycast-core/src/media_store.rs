// Media asset store
//
// Read-only view of stored VOD files. Locations are the `storage_location`
// strings written by the download pipeline: absolute paths are used as-is,
// relative ones resolve against the configured media root.

use async_trait::async_trait;
use std::io::Result;
use std::path::{Path, PathBuf};
use tokio::fs;

#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Path handed to the relay process as its input
    fn resolve(&self, location: &str) -> PathBuf;

    async fn exists(&self, location: &str) -> Result<bool>;

    /// Byte size of the stored file
    async fn size(&self, location: &str) -> Result<u64>;
}

/// Local filesystem store
#[derive(Debug, Clone)]
pub struct LocalMediaStore {
    root: PathBuf,
}

impl LocalMediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    fn resolve(&self, location: &str) -> PathBuf {
        let path = Path::new(location);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    async fn exists(&self, location: &str) -> Result<bool> {
        if location.trim().is_empty() {
            return Ok(false);
        }
        let path = self.resolve(location);
        match fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn size(&self, location: &str) -> Result<u64> {
        let path = self.resolve(location);
        let meta = fs::metadata(&path).await?;

        tracing::trace!("Media size: {:?} ({} bytes)", path, meta.len());

        Ok(meta.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_relative_location_resolves_against_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("v1.mp4"), b"0123456789").unwrap();

        let store = LocalMediaStore::new(dir.path());
        assert!(store.exists("v1.mp4").await.unwrap());
        assert_eq!(store.size("v1.mp4").await.unwrap(), 10);
        assert_eq!(store.resolve("v1.mp4"), dir.path().join("v1.mp4"));
    }

    #[tokio::test]
    async fn test_absolute_location_ignores_root() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("abs.mp4");
        std::fs::write(&file, b"abc").unwrap();

        let store = LocalMediaStore::new("/nonexistent-root");
        let location = file.to_str().unwrap();
        assert!(store.exists(location).await.unwrap());
        assert_eq!(store.resolve(location), file);
    }

    #[tokio::test]
    async fn test_missing_file_and_directory_do_not_exist() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalMediaStore::new(dir.path());

        assert!(!store.exists("missing.mp4").await.unwrap());
        assert!(!store.exists("").await.unwrap());
        // a directory is not a playable asset
        assert!(!store.exists(dir.path().to_str().unwrap()).await.unwrap());
        assert!(store.size("missing.mp4").await.is_err());
    }
}
