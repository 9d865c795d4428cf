//! Avatar upload pipeline

pub mod ports;
pub mod service;
pub mod validator;

pub use service::{is_valid_object_key, AvatarUploadService};
pub use validator::{ImageUploadValidator, ValidatedImage};
