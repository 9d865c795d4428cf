//! User profile ports and the profile sync service

pub mod ports;
pub mod service;

pub use service::ProfileSyncService;
