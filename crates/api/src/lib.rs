//! # Userhub API
//!
//! HTTP application layer - routes, application context and entry point.
//!
//! This crate contains:
//! - axum routes for profiles, avatar uploads and health
//! - Application context (dependency injection)
//! - Logging setup and HTTP error mapping
//!
//! ## Architecture
//! - Depends on `domain`, `core`, and `infra`
//! - Wires up the hexagonal architecture

pub mod context;
pub mod error;
pub mod routes;
pub mod utils;

pub use context::AppContext;
pub use error::ApiError;
pub use routes::router;
