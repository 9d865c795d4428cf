//! Application constants
//!
//! Centralized location for all domain-level constants used throughout the
//! application.

// Profile defaults
pub const DEFAULT_LANGUAGE: &str = "pt-br";

/// Attempts of the lookup-and-merge path before a conflict is surfaced.
pub const MAX_SYNC_ATTEMPTS: usize = 3;

// Avatar uploads
pub const ALLOWED_IMAGE_CONTENT_TYPES: [&str; 5] =
    ["image/jpeg", "image/jpg", "image/png", "image/gif", "image/webp"];
pub const ALLOWED_IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;
pub const UPLOAD_BODY_LIMIT_BYTES: usize = 2 * MAX_IMAGE_BYTES;
pub const UPLOAD_FILE_PREFIX: &str = "profile";
pub const DEFAULT_UPLOAD_PUBLIC_PREFIX: &str = "/uploads";
pub const DEFAULT_UPLOAD_TIMEOUT_SECS: u64 = 10;

// Identity provider
pub const SESSION_COOKIE_NAME: &str = "sb-access-token";
