//! Database implementations

pub mod manager;
pub mod user_profile_repository;

pub use manager::*;
pub use user_profile_repository::*;
