//! Port interfaces for the external identity provider
//!
//! Credential storage, password hashing and token issuance all live with the
//! provider. These traits only cover what this service consumes.

use async_trait::async_trait;
use tokio::sync::broadcast;
use userhub_domain::{AuthEvent, IdentityUser, ProfileAttributes, Result, Session, SignUpOutcome};

/// Server-side access token verification
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Resolve the user behind an access token.
    ///
    /// # Errors
    /// `AccountError::Unauthorized` when the token is missing, expired or
    /// revoked.
    async fn verify(&self, access_token: &str) -> Result<IdentityUser>;
}

/// Client-side provider session management
#[async_trait]
pub trait IdentityClient: Send + Sync {
    /// Session persisted by the client, if any.
    async fn current_session(&self) -> Result<Option<Session>>;

    /// Register credentials; `metadata` is attached to the provider user.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &ProfileAttributes,
    ) -> Result<SignUpOutcome>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session>;

    async fn refresh_session(&self) -> Result<Session>;

    async fn sign_out(&self) -> Result<()>;

    /// Session-change notifications. Events emitted before the call are not
    /// replayed.
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}
