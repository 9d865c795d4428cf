//! Configuration management

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_UPLOAD_PUBLIC_PREFIX, DEFAULT_UPLOAD_TIMEOUT_SECS};

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub uploads: UploadConfig,
    pub identity: IdentityConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    pub pool_size: u32,
}

/// Avatar storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Directory the local object store writes into.
    pub dir: String,
    /// Path prefix of the public reference returned to callers.
    pub public_prefix: String,
    /// Upper bound for a single storage write.
    pub write_timeout_secs: u64,
}

impl UploadConfig {
    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs.max(1))
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            dir: "public/uploads".to_string(),
            public_prefix: DEFAULT_UPLOAD_PUBLIC_PREFIX.to_string(),
            write_timeout_secs: DEFAULT_UPLOAD_TIMEOUT_SECS,
        }
    }
}

/// External identity provider (Supabase GoTrue) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    pub url: String,
    #[serde(skip_serializing)]
    pub anon_key: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig { bind_addr: "127.0.0.1:3000".to_string() },
            database: DatabaseConfig { path: "userhub.db".to_string(), pool_size: 8 },
            uploads: UploadConfig::default(),
            identity: IdentityConfig {
                url: "http://localhost:54321".to_string(),
                anon_key: String::new(),
            },
        }
    }
}
