//! Profile sync service - reconciles identity provider users with profile rows

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use userhub_domain::constants::MAX_SYNC_ATTEMPTS;
use userhub_domain::{
    AccountError, ProfileAttributes, ProfileChanges, ProfileIdentity, Result, SyncOutcome,
    SyncRequest, UserProfile,
};

use super::ports::UserProfileRepository;

/// Find-or-create service over the profile store
///
/// Lookup precedence: external identity id first, then email. A row found by
/// email that is already linked to another external id is never merged.
pub struct ProfileSyncService {
    repository: Arc<dyn UserProfileRepository>,
    max_attempts: usize,
}

impl ProfileSyncService {
    /// Create a new sync service
    pub fn new(repository: Arc<dyn UserProfileRepository>) -> Self {
        Self { repository, max_attempts: MAX_SYNC_ATTEMPTS }
    }

    /// Override how many times a conflicting write re-runs the lookup.
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Lookup-only request.
    ///
    /// # Errors
    /// `Validation` when the identity is empty, `NotFound` when no row
    /// matches, `Conflict` when email and external id point at different
    /// accounts.
    pub async fn find(&self, identity: ProfileIdentity) -> Result<UserProfile> {
        let identity = identity.validated()?;
        self.resolve(&identity)
            .await?
            .ok_or_else(|| AccountError::NotFound("user profile not found".into()))
    }

    /// Find the matching row and merge the attributes into it, or create it.
    ///
    /// Exactly one row is created or updated per call. A unique-constraint
    /// conflict on write means another request won a race for the same
    /// identity; the lookup-and-merge path is re-run up to `max_attempts`.
    pub async fn sync(&self, request: SyncRequest) -> Result<SyncOutcome> {
        let identity = request.identity.validated()?;
        let attributes = request.attributes.normalized();

        let mut attempt = 1;
        loop {
            let result = match self.resolve(&identity).await? {
                Some(existing) => self
                    .merge_into(existing, &identity, &attributes)
                    .await
                    .map(|profile| SyncOutcome { profile, created: false }),
                None => self
                    .create(&identity, attributes.clone())
                    .await
                    .map(|profile| SyncOutcome { profile, created: true }),
            };

            match result {
                Err(AccountError::Conflict(reason)) if attempt < self.max_attempts => {
                    warn!(attempt, reason = %reason, "profile write conflicted, re-running lookup");
                    attempt += 1;
                }
                Ok(outcome) => {
                    info!(
                        profile_id = outcome.profile.id,
                        created = outcome.created,
                        attempt,
                        "profile synced"
                    );
                    return Ok(outcome);
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Update-only merge path for a session-authenticated caller.
    ///
    /// The identity comes from the verified session, never from the request
    /// body. No row is created: a session without a profile gets `NotFound`.
    pub async fn update_for_identity(
        &self,
        identity: ProfileIdentity,
        attributes: ProfileAttributes,
    ) -> Result<UserProfile> {
        let identity = identity.validated()?;
        let existing = self
            .resolve(&identity)
            .await?
            .ok_or_else(|| AccountError::NotFound("user profile not found".into()))?;

        let profile = self.merge_into(existing, &identity, &attributes.normalized()).await?;
        info!(profile_id = profile.id, "profile updated");
        Ok(profile)
    }

    async fn resolve(&self, identity: &ProfileIdentity) -> Result<Option<UserProfile>> {
        if let Some(external_id) = identity.external_id.as_deref() {
            if let Some(profile) = self.repository.get_by_external_id(external_id).await? {
                return Ok(Some(profile));
            }
        }

        let Some(email) = identity.email.as_deref() else {
            return Ok(None);
        };

        let Some(profile) = self.repository.get_by_email(email).await? else {
            return Ok(None);
        };

        match (identity.external_id.as_deref(), profile.external_id.as_deref()) {
            (Some(incoming), Some(linked)) if incoming != linked => {
                warn!(profile_id = profile.id, "email belongs to a different external identity");
                Err(AccountError::Conflict("email is linked to a different identity".into()))
            }
            _ => Ok(Some(profile)),
        }
    }

    async fn merge_into(
        &self,
        existing: UserProfile,
        identity: &ProfileIdentity,
        attributes: &ProfileAttributes,
    ) -> Result<UserProfile> {
        let mut changes = ProfileChanges::new(attributes.clone(), Utc::now());

        if existing.external_id.is_none() && identity.external_id.is_some() {
            debug!(profile_id = existing.id, "linking external identity to profile");
            changes = changes.linking(identity.external_id.clone());
        }

        if identity.email.as_deref().is_some_and(|email| email != existing.email) {
            debug!(profile_id = existing.id, "ignoring email change on existing profile");
        }

        self.repository.update(existing.id, changes).await
    }

    async fn create(
        &self,
        identity: &ProfileIdentity,
        attributes: ProfileAttributes,
    ) -> Result<UserProfile> {
        let email = identity.email.clone().ok_or_else(|| {
            AccountError::Validation("email is required to create a profile".into())
        })?;

        let profile = attributes.into_new_profile(email, identity.external_id.clone(), Utc::now());
        self.repository.create(profile).await
    }
}
