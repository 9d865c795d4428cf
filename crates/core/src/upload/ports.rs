//! Port interfaces for avatar storage

use async_trait::async_trait;
use userhub_domain::Result;

/// Stored object as read back from an [`ObjectStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Write-once blob storage for validated avatars
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Persist `bytes` under `key`, replacing any previous object.
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Option<StoredObject>>;

    /// Public-facing reference for a stored key.
    fn public_url(&self, key: &str) -> String;
}
