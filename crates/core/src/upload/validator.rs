//! Avatar content validation
//!
//! Checks run in a fixed order and the first failure is reported:
//!
//! 1. a non-empty payload is present
//! 2. an owner email is present
//! 3. the claimed content type is allow-listed
//! 4. the payload is within the size limit
//! 5. the file-name extension is allow-listed
//! 6. the leading bytes match a known image signature
//!
//! The owner lookup sits between steps 2 and 3 and lives in the service.

use userhub_domain::constants::{
    ALLOWED_IMAGE_CONTENT_TYPES, ALLOWED_IMAGE_EXTENSIONS, MAX_IMAGE_BYTES,
};
use userhub_domain::{ImageFormat, ImageUpload, UploadRejection};

/// Upload that passed every content check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedImage {
    /// Format detected from the magic number
    pub format: ImageFormat,
    /// Lower-cased extension taken from the claimed file name
    pub extension: String,
    pub content_type: String,
}

/// Allow-list and size validator for avatar uploads
#[derive(Debug, Clone)]
pub struct ImageUploadValidator {
    max_bytes: usize,
    allowed_content_types: Vec<String>,
    allowed_extensions: Vec<String>,
}

impl Default for ImageUploadValidator {
    fn default() -> Self {
        Self {
            max_bytes: MAX_IMAGE_BYTES,
            allowed_content_types: ALLOWED_IMAGE_CONTENT_TYPES
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            allowed_extensions: ALLOWED_IMAGE_EXTENSIONS.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

impl ImageUploadValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Steps 1 and 2: payload and owner presence.
    ///
    /// Returns the trimmed owner email.
    pub fn require_payload_and_owner(
        &self,
        upload: &ImageUpload,
    ) -> Result<String, UploadRejection> {
        if upload.bytes.is_empty() {
            return Err(UploadRejection::NoFile);
        }

        upload
            .owner_email
            .as_deref()
            .map(str::trim)
            .filter(|email| !email.is_empty())
            .map(str::to_string)
            .ok_or(UploadRejection::MissingOwner)
    }

    /// Steps 3 to 6: content type, size, extension, magic number.
    ///
    /// The detected format only has to be one of the known image formats; it
    /// is not cross-checked against the claimed type or extension.
    pub fn validate(&self, upload: &ImageUpload) -> Result<ValidatedImage, UploadRejection> {
        let content_type = upload
            .content_type
            .as_deref()
            .map(|ct| ct.trim().to_ascii_lowercase())
            .filter(|ct| self.allowed_content_types.iter().any(|allowed| allowed == ct))
            .ok_or(UploadRejection::TypeNotAllowed)?;

        let size = upload.bytes.len();
        if size > self.max_bytes {
            return Err(UploadRejection::TooLarge { size, max: self.max_bytes });
        }

        let extension = upload
            .extension()
            .filter(|ext| self.allowed_extensions.iter().any(|allowed| allowed == ext))
            .ok_or(UploadRejection::ExtensionNotAllowed)?;

        let format = ImageFormat::detect(&upload.bytes).ok_or(UploadRejection::InvalidContent)?;

        Ok(ValidatedImage { format, extension, content_type })
    }
}
