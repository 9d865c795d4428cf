//! # Userhub Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port/adapter interfaces (traits)
//! - Profile synchronization (find-or-create with merge)
//! - Avatar upload validation and storage orchestration
//! - Client session context (auth state machine)
//!
//! ## Architecture Principles
//! - Only depends on `userhub-domain`
//! - No database, HTTP, or filesystem code
//! - All external dependencies via traits

pub mod identity;
pub mod session;
pub mod upload;
pub mod user;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-export specific items to avoid ambiguity
pub use identity::ports::{IdentityClient, IdentityVerifier};
pub use session::ports::ProfileApi;
pub use session::SessionContext;
pub use upload::ports::{ObjectStore, StoredObject};
pub use upload::{AvatarUploadService, ImageUploadValidator, ValidatedImage};
pub use user::ports::UserProfileRepository;
pub use user::ProfileSyncService;
