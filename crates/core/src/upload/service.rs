//! Avatar upload service - validation, owner check and storage

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};
use userhub_domain::constants::{DEFAULT_UPLOAD_TIMEOUT_SECS, UPLOAD_FILE_PREFIX};
use userhub_domain::{AccountError, ImageUpload, Result, UploadReceipt, UploadRejection};

use super::ports::{ObjectStore, StoredObject};
use super::validator::ImageUploadValidator;
use crate::user::ports::UserProfileRepository;

/// Stores validated avatars for existing profiles
///
/// The profile row itself is not touched; callers write the returned URL
/// back through the profile sync path.
pub struct AvatarUploadService {
    repository: Arc<dyn UserProfileRepository>,
    store: Arc<dyn ObjectStore>,
    validator: ImageUploadValidator,
    write_timeout: Duration,
    last_timestamp: AtomicI64,
}

impl AvatarUploadService {
    pub fn new(repository: Arc<dyn UserProfileRepository>, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            repository,
            store,
            validator: ImageUploadValidator::default(),
            write_timeout: Duration::from_secs(DEFAULT_UPLOAD_TIMEOUT_SECS),
            last_timestamp: AtomicI64::new(0),
        }
    }

    pub fn with_validator(mut self, validator: ImageUploadValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Validate and store an avatar.
    ///
    /// # Errors
    /// - `Validation` for any content rejection, or a missing email
    /// - `Forbidden` when the email has no profile
    /// - `Timeout` when the storage write exceeds the configured bound
    /// - `Storage` when the write fails
    pub async fn upload(&self, upload: ImageUpload) -> Result<UploadReceipt> {
        let owner = self.validator.require_payload_and_owner(&upload)?;

        if self.repository.get_by_email(&owner).await?.is_none() {
            debug!("avatar upload for unknown profile refused");
            return Err(UploadRejection::UnknownOwner.into());
        }

        let validated = self.validator.validate(&upload)?;
        let size = upload.bytes.len();
        let key = format!(
            "{UPLOAD_FILE_PREFIX}-{}-{}.{}",
            sanitize_owner(&owner),
            self.next_timestamp(),
            validated.extension
        );

        match tokio::time::timeout(
            self.write_timeout,
            self.store.put(&key, upload.bytes, &validated.content_type),
        )
        .await
        {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                warn!(object_key = %key, error = %err, "avatar write failed");
                return Err(err);
            }
            Err(_) => {
                warn!(
                    object_key = %key,
                    timeout_ms = self.write_timeout.as_millis() as u64,
                    "avatar write timed out"
                );
                return Err(AccountError::Timeout("storage write timed out".into()));
            }
        }

        info!(object_key = %key, size, format = ?validated.format, "avatar stored");

        Ok(UploadReceipt {
            url: self.store.public_url(&key),
            object_key: key,
            format: validated.format,
            size,
        })
    }

    /// Read a stored avatar back.
    ///
    /// Keys outside the generated name alphabet are refused before the store
    /// is consulted.
    pub async fn fetch(&self, key: &str) -> Result<StoredObject> {
        if !is_valid_object_key(key) {
            return Err(AccountError::NotFound("upload not found".into()));
        }
        self.store.get(key).await?.ok_or_else(|| AccountError::NotFound("upload not found".into()))
    }

    /// Milliseconds since the epoch, strictly increasing per service instance.
    fn next_timestamp(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let mut last = self.last_timestamp.load(Ordering::SeqCst);
        loop {
            let next = now.max(last + 1);
            match self.last_timestamp.compare_exchange(
                last,
                next,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return next,
                Err(current) => last = current,
            }
        }
    }
}

fn sanitize_owner(email: &str) -> String {
    email.chars().map(|c| if c.is_ascii_alphanumeric() { c } else { '_' }).collect()
}

/// Whether `key` could have been produced by [`AvatarUploadService::upload`].
pub fn is_valid_object_key(key: &str) -> bool {
    !key.is_empty()
        && !key.contains("..")
        && key.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}
