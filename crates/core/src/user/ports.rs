//! Port interfaces for user profile management
//!
//! These traits define the boundaries between core business logic
//! and infrastructure implementations for user profile operations.

use async_trait::async_trait;
use userhub_domain::{ProfileChanges, Result, UserProfile};

/// Trait for user profile persistence and retrieval
///
/// Implementations must enforce uniqueness of `email` and of `external_id`
/// (when present) and report violations as `AccountError::Conflict`.
#[async_trait]
pub trait UserProfileRepository: Send + Sync {
    /// Get user profile by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<UserProfile>>;

    /// Get user profile by identity provider user ID
    async fn get_by_external_id(&self, external_id: &str) -> Result<Option<UserProfile>>;

    /// Get user profile by email
    async fn get_by_email(&self, email: &str) -> Result<Option<UserProfile>>;

    /// Insert a new user profile and return it with its store-assigned ID
    async fn create(&self, profile: UserProfile) -> Result<UserProfile>;

    /// Apply `changes` to the row identified by `id` and return the stored row
    ///
    /// Must be atomic per column: a concurrent update of other fields is never
    /// overwritten with a stale value. `NotFound` when the row is gone.
    async fn update(&self, id: i64, changes: ProfileChanges) -> Result<UserProfile>;
}
