//! Port interfaces used by the client session context

use async_trait::async_trait;
use userhub_domain::{Result, SyncRequest, UserProfile};

/// Client view of the account HTTP surface
#[async_trait]
pub trait ProfileApi: Send + Sync {
    /// `GET /user?supabaseId=..`; `Ok(None)` when no row exists.
    async fn fetch_profile(&self, external_id: &str) -> Result<Option<UserProfile>>;

    /// `POST /user` find-or-create.
    async fn sync_profile(&self, request: &SyncRequest) -> Result<UserProfile>;

    /// `POST /upload`; returns the public reference of the stored avatar.
    async fn upload_avatar(
        &self,
        owner_email: &str,
        file_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String>;
}
