//! Avatar upload types

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::errors::AccountError;

/// Raw avatar upload as received from the client
#[derive(Debug, Clone, Default)]
pub struct ImageUpload {
    pub bytes: Vec<u8>,
    /// Content type claimed by the client
    pub content_type: Option<String>,
    /// File name claimed by the client
    pub file_name: Option<String>,
    /// Email of the profile that owns the image
    pub owner_email: Option<String>,
}

impl ImageUpload {
    /// Lower-cased text after the last `.` of the claimed file name.
    pub fn extension(&self) -> Option<String> {
        let name = self.file_name.as_deref()?;
        let (_, ext) = name.rsplit_once('.')?;
        if ext.is_empty() {
            None
        } else {
            Some(ext.to_ascii_lowercase())
        }
    }
}

/// Image formats recognised by their leading bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpeg,
    Png,
    Gif,
    Webp,
}

impl ImageFormat {
    pub const ALL: [Self; 4] = [Self::Jpeg, Self::Png, Self::Gif, Self::Webp];

    /// Magic number the payload must start with.
    pub fn signature(self) -> &'static [u8] {
        match self {
            Self::Jpeg => &[0xFF, 0xD8, 0xFF],
            Self::Png => &[0x89, 0x50, 0x4E, 0x47],
            Self::Gif => &[0x47, 0x49, 0x46],
            // RIFF container header
            Self::Webp => &[0x52, 0x49, 0x46, 0x46],
        }
    }

    /// Detect the format from the payload's leading bytes.
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        Self::ALL.into_iter().find(|format| bytes.starts_with(format.signature()))
    }
}

/// Reasons an avatar upload is refused, in pipeline order
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadRejection {
    #[error("no file")]
    NoFile,

    #[error("email is required")]
    MissingOwner,

    #[error("unauthorized")]
    UnknownOwner,

    #[error("type not allowed")]
    TypeNotAllowed,

    #[error("too large")]
    TooLarge { size: usize, max: usize },

    #[error("extension not allowed")]
    ExtensionNotAllowed,

    #[error("invalid image content")]
    InvalidContent,
}

impl From<UploadRejection> for AccountError {
    fn from(rejection: UploadRejection) -> Self {
        match rejection {
            UploadRejection::UnknownOwner => Self::Forbidden(rejection.to_string()),
            other => Self::Validation(other.to_string()),
        }
    }
}

/// Reference to a stored avatar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
    /// Public-facing reference path, e.g. `/uploads/profile-a_b_com-1700000000000.png`
    pub url: String,
    /// Object name inside the store
    pub object_key: String,
    pub format: ImageFormat,
    pub size: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_each_signature() {
        assert_eq!(ImageFormat::detect(&[0xFF, 0xD8, 0xFF, 0xE0]), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::detect(b"\x89PNG\r\n\x1a\n"), Some(ImageFormat::Png));
        assert_eq!(ImageFormat::detect(b"GIF89a"), Some(ImageFormat::Gif));
        assert_eq!(ImageFormat::detect(b"RIFF\0\0\0\0WEBP"), Some(ImageFormat::Webp));
        assert_eq!(ImageFormat::detect(b"%PDF-1.7"), None);
        assert_eq!(ImageFormat::detect(&[0xFF, 0xD8]), None);
    }

    #[test]
    fn extension_is_lowercased_text_after_last_dot() {
        let upload = ImageUpload { file_name: Some("me.final.JPG".into()), ..Default::default() };
        assert_eq!(upload.extension().as_deref(), Some("jpg"));

        let no_ext = ImageUpload { file_name: Some("avatar".into()), ..Default::default() };
        assert_eq!(no_ext.extension(), None);
    }

    #[test]
    fn unknown_owner_maps_to_forbidden() {
        assert!(matches!(
            AccountError::from(UploadRejection::UnknownOwner),
            AccountError::Forbidden(_)
        ));
        assert_eq!(
            AccountError::from(UploadRejection::InvalidContent),
            AccountError::Validation("invalid image content".into())
        );
    }
}
