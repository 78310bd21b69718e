//! Blob Storage on the local file system using Tokio

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::BlobStore,
};
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs;
use tracing::debug;

const BLOB_EXTENSION: &str = "blob";

/// One file per blob under a single directory.
///
/// Writes land in a temporary file that is renamed into place, so a blob is
/// either fully present or absent after a crash.
pub struct FileBlobStore {
    root: PathBuf,
}

impl FileBlobStore {
    /// Store blobs under `root`, created on first write.
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Store blobs in the platform data directory.
    pub fn in_data_dir() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".local")
                    .join("share")
            })
            .join("offline-music")
            .join("tracks");

        Self::new(data_dir)
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    /// File name for a key. Keys are opaque, so anything outside
    /// `[A-Za-z0-9_-]` is hex-escaped to keep them inside `root`.
    fn path_for(&self, key: &str) -> PathBuf {
        let mut name = String::with_capacity(key.len());
        for b in key.bytes() {
            if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' {
                name.push(b as char);
            } else {
                name.push_str(&format!("%{:02X}", b));
            }
        }
        self.root.join(format!("{}.{}", name, BLOB_EXTENSION))
    }

    fn map_io_error(e: std::io::Error) -> BridgeError {
        if e.kind() == ErrorKind::StorageFull {
            BridgeError::StorageFull(e.to_string())
        } else {
            BridgeError::Io(e)
        }
    }
}

#[async_trait]
impl BlobStore for FileBlobStore {
    async fn put(&self, key: &str, data: Bytes) -> Result<()> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(Self::map_io_error)?;

        let path = self.path_for(key);
        let tmp = path.with_extension("part");

        if let Err(e) = fs::write(&tmp, data.as_ref()).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(Self::map_io_error(e));
        }
        fs::rename(&tmp, &path).await.map_err(Self::map_io_error)?;

        debug!(key = key, size = data.len(), "Wrote blob");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        match fs::read(self.path_for(key)).await {
            Ok(data) => {
                debug!(key = key, size = data.len(), "Read blob");
                Ok(Some(Bytes::from(data)))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Self::map_io_error(e)),
        }
    }

    async fn remove(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => {
                debug!(key = key, "Deleted blob");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::map_io_error(e)),
        }
    }

    async fn clear(&self) -> Result<()> {
        let mut read_dir = match fs::read_dir(&self.root).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(Self::map_io_error(e)),
        };

        let mut removed = 0usize;
        while let Some(entry) = read_dir.next_entry().await.map_err(Self::map_io_error)? {
            let path = entry.path();
            let is_ours = path
                .extension()
                .map(|ext| ext == BLOB_EXTENSION || ext == "part")
                .unwrap_or(false);
            if is_ours {
                fs::remove_file(&path).await.map_err(Self::map_io_error)?;
                removed += 1;
            }
        }

        debug!(path = ?self.root, removed, "Cleared blobs");
        Ok(())
    }

    async fn contains(&self, key: &str) -> Result<bool> {
        fs::try_exists(self.path_for(key))
            .await
            .map_err(Self::map_io_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBlobStore::new(dir.path().join("tracks"));

        store.put("4uLU6hMC", Bytes::from_static(b"RIFF")).await.unwrap();
        assert!(store.contains("4uLU6hMC").await.unwrap());
        assert_eq!(
            store.get("4uLU6hMC").await.unwrap().unwrap().as_ref(),
            b"RIFF"
        );

        store.remove("4uLU6hMC").await.unwrap();
        assert!(store.get("4uLU6hMC").await.unwrap().is_none());
        store.remove("4uLU6hMC").await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_root_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBlobStore::new(dir.path().join("never-created"));

        assert!(store.get("x").await.unwrap().is_none());
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_keys_cannot_escape_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBlobStore::new(dir.path().join("tracks"));

        store.put("../evil", Bytes::from_static(b"x")).await.unwrap();
        assert!(!dir.path().join("evil.blob").exists());
        assert_eq!(store.get("../evil").await.unwrap().unwrap().as_ref(), b"x");
    }

    #[tokio::test]
    async fn test_clear_removes_only_blobs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("tracks");
        let store = FileBlobStore::new(root.clone());

        store.put("a", Bytes::from_static(b"1")).await.unwrap();
        store.put("b", Bytes::from_static(b"2")).await.unwrap();
        std::fs::write(root.join("README"), b"keep").unwrap();

        store.clear().await.unwrap();

        assert!(!store.contains("a").await.unwrap());
        assert!(!store.contains("b").await.unwrap());
        assert!(root.join("README").exists());
    }
}
