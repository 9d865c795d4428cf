//! Shared helpers for the HTTP layer

pub mod auth;
pub mod health;
pub mod logging;
