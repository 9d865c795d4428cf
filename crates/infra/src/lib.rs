//! # Userhub Infrastructure
//!
//! Infrastructure implementations of core ports.
//!
//! This crate contains:
//! - SQLite profile store (rusqlite + r2d2)
//! - Configuration loading (environment and config files)
//! - Local filesystem object store for avatars
//! - Supabase Auth adapter and the HTTP profile API client
//!
//! ## Architecture
//! - Implements traits defined in `userhub-core`
//! - Contains all "impure" code (I/O, network, filesystem)

pub mod config;
pub mod database;
pub mod errors;
pub mod http;
pub mod identity;
pub mod storage;

// Re-export commonly used items
pub use database::{DbManager, SqliteUserProfileRepository};
pub use errors::InfraError;
pub use http::{HttpClient, HttpProfileApi};
pub use identity::SupabaseAuthClient;
pub use storage::LocalObjectStore;
