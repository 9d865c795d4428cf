//! Filesystem-backed object store for avatars.
//!
//! Objects are written to `<dir>/<key>` and served back under the configured
//! public prefix. Writes go through a temporary file and a rename so readers
//! never observe a partial image. The whole write runs on one blocking task:
//! a caller that stops waiting (upload timeout) leaves either the finished
//! object or nothing, never a staging file.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tokio::{fs, task};
use tracing::debug;
use userhub_core::upload::ports::{ObjectStore, StoredObject};
use userhub_domain::{AccountError, Result, UploadConfig};

use crate::errors::InfraError;

/// [`ObjectStore`] over a local directory
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
    public_prefix: String,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>, public_prefix: impl Into<String>) -> Self {
        let public_prefix = public_prefix.into().trim_end_matches('/').to_string();
        Self { root: root.into(), public_prefix }
    }

    pub fn from_config(config: &UploadConfig) -> Self {
        Self::new(&config.dir, &config.public_prefix)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the storage directory when it does not exist yet.
    pub async fn ensure_root(&self) -> Result<()> {
        fs::create_dir_all(&self.root).await.map_err(storage_error)
    }

    fn object_path(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
            return Err(AccountError::Storage(format!("invalid object key: {key}")));
        }
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        let path = self.object_path(key)?;
        self.ensure_root().await?;

        let root = self.root.clone();
        let size = bytes.len();
        task::spawn_blocking(move || write_atomically(&root, &path, &bytes))
            .await
            .map_err(|err| AccountError::Internal(format!("object write task failed: {err}")))??;

        debug!(object_key = key, content_type, size, "object written");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<StoredObject>> {
        let path = self.object_path(key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(StoredObject { bytes, content_type: content_type_for(key) })),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(storage_error(err)),
        }
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_prefix, key)
    }
}

/// Stage `bytes` in a hidden temp file beside `path`, then rename it into place.
///
/// The staging file is removed on drop unless the rename succeeded.
fn write_atomically(root: &Path, path: &Path, bytes: &[u8]) -> Result<()> {
    let mut staging = tempfile::Builder::new()
        .prefix(".")
        .suffix(".partial")
        .tempfile_in(root)
        .map_err(storage_error)?;
    staging.write_all(bytes).map_err(storage_error)?;
    staging.as_file().sync_all().map_err(storage_error)?;
    persist(staging, path)
}

fn persist(staging: NamedTempFile, path: &Path) -> Result<()> {
    staging.persist(path).map(drop).map_err(|err| storage_error(err.error))
}

fn content_type_for(key: &str) -> String {
    let extension = key.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
    .to_string()
}

fn storage_error(err: std::io::Error) -> AccountError {
    match InfraError::from(err).0 {
        // A missing directory or file during a write is a storage fault, not a lookup miss.
        AccountError::NotFound(message) => AccountError::Storage(message),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tempfile::TempDir;

    use super::*;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\nrest";

    #[tokio::test]
    async fn put_then_get_round_trips_with_content_type() {
        let dir = TempDir::new().unwrap();
        let store = LocalObjectStore::new(dir.path().join("uploads"), "/uploads/");

        store.put("profile-a-1.png", PNG.to_vec(), "image/png").await.unwrap();

        let object = store.get("profile-a-1.png").await.unwrap().unwrap();
        assert_eq!(object.bytes, PNG);
        assert_eq!(object.content_type, "image/png");
        assert!(dir.path().join("uploads/profile-a-1.png").exists());
        assert_eq!(staging_files(&dir.path().join("uploads")), 0);
    }

    fn staging_files(dir: &Path) -> usize {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".partial"))
            .count()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn abandoned_put_leaves_no_staging_file() {
        let dir = TempDir::new().unwrap();
        let store = LocalObjectStore::new(dir.path(), "/uploads");
        let bytes = vec![0u8; 4 * 1024 * 1024];

        for i in 0..10u64 {
            let key = format!("profile-a-{i}.png");
            // Dropped at a different point each round, like an upload that hit
            // its timeout.
            let limit = Duration::from_micros(i * 300);
            let _ = tokio::time::timeout(limit, store.put(&key, bytes.clone(), "image/png")).await;
        }

        // Give abandoned writes time to finish on the blocking pool.
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(staging_files(dir.path()), 0);
    }

    #[tokio::test]
    async fn failed_rename_removes_staging_file() {
        let dir = TempDir::new().unwrap();
        let store = LocalObjectStore::new(dir.path(), "/uploads");
        // A directory at the target path makes the rename fail.
        std::fs::create_dir(dir.path().join("profile-a-1.png")).unwrap();
        std::fs::write(dir.path().join("profile-a-1.png/keep"), b"x").unwrap();

        let err = store.put("profile-a-1.png", PNG.to_vec(), "image/png").await.unwrap_err();
        assert!(matches!(err, AccountError::Storage(_)), "got {err:?}");
        assert_eq!(staging_files(dir.path()), 0);
    }

    #[tokio::test]
    async fn missing_object_is_none() {
        let dir = TempDir::new().unwrap();
        let store = LocalObjectStore::new(dir.path(), "/uploads");
        assert!(store.get("profile-a-1.png").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn keys_with_separators_are_refused() {
        let dir = TempDir::new().unwrap();
        let store = LocalObjectStore::new(dir.path(), "/uploads");

        let err = store.put("../escape.png", PNG.to_vec(), "image/png").await.unwrap_err();
        assert!(matches!(err, AccountError::Storage(_)));
        assert!(store.get("nested/a.png").await.is_err());
    }

    #[test]
    fn public_url_joins_prefix_once() {
        let store = LocalObjectStore::new("/tmp/x", "https://cdn.example.com/uploads/");
        assert_eq!(
            store.public_url("profile-a-1.jpg"),
            "https://cdn.example.com/uploads/profile-a-1.jpg"
        );
    }

    #[test]
    fn content_type_follows_extension() {
        assert_eq!(content_type_for("a.JPG"), "image/jpeg");
        assert_eq!(content_type_for("a.webp"), "image/webp");
        assert_eq!(content_type_for("noext"), "application/octet-stream");
    }
}
