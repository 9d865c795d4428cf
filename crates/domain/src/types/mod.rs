//! Domain types and models

pub mod session;
pub mod upload;
pub mod user;

pub use session::{AuthEvent, IdentityUser, Session, SessionState, SignUpOutcome};
pub use upload::{ImageFormat, ImageUpload, UploadReceipt, UploadRejection};
pub use user::{
    legacy_full_name, ProfileAttributes, ProfileChanges, ProfileIdentity, SyncOutcome,
    SyncRequest, UserProfile,
};
